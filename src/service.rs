//! Trigger-level jobs: each one runs a core operation under the outcome
//! notifier and records the result for the health endpoint.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::TournamentRef;
use crate::crawler::{CrawlSummary, EventCrawler};
use crate::error::{IngestionError, Result};
use crate::model::{DataKind, IngestionOutcome, IngestionTarget};
use crate::notify::OutcomeNotifier;
use crate::odds::{GapFillSummary, OddsGapFiller};
use crate::server::HealthState;
use crate::source::RemoteSource;
use crate::store::BlobStore;

/// Pending id log writes held for the odds trigger.
pub const ID_LOG_QUEUE_CAPACITY: usize = 256;

/// Totals of one daily run over the configured target list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyReport {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct IngestionService {
    crawler: EventCrawler,
    odds: OddsGapFiller,
    notifier: OutcomeNotifier,
    /// Receives the path of every events id log we write.
    id_log_events: Option<mpsc::Sender<String>>,
    health: HealthState,
}

impl IngestionService {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        store: Arc<dyn BlobStore>,
        notifier: OutcomeNotifier,
    ) -> Self {
        Self {
            crawler: EventCrawler::new(source.clone(), store.clone()),
            odds: OddsGapFiller::new(source, store),
            notifier,
            id_log_events: None,
            health: HealthState::new(),
        }
    }

    /// Publish events id log writes to `sender`, the in-process stand-in for a
    /// storage trigger. Writes are dropped with a warning while the queue is full.
    pub fn with_id_log_events(mut self, sender: mpsc::Sender<String>) -> Self {
        self.id_log_events = Some(sender);
        self
    }

    pub fn health(&self) -> HealthState {
        self.health.clone()
    }

    async fn record<T: std::fmt::Display>(&self, result: &Result<T>) {
        let outcome = IngestionOutcome::from_result(result);
        self.health.record(outcome).await;
    }

    fn publish_id_log(&self, summary: &CrawlSummary) {
        if let Some(sender) = &self.id_log_events {
            match sender.try_send(summary.id_log.path.clone()) {
                Ok(()) => {}
                // the next write of this log triggers the gap-fill again
                Err(TrySendError::Full(path)) => {
                    warn!("Id log queue is full; {} will not trigger odds ingestion", path)
                }
                Err(TrySendError::Closed(path)) => {
                    warn!("Id log listener is gone; {} will not trigger odds ingestion", path)
                }
            }
        }
    }

    /// Crawl a whole season from page 0.
    pub async fn ingest_events_season(
        &self,
        sport: &str,
        tournament: &str,
        season: &str,
    ) -> Result<CrawlSummary> {
        let target = IngestionTarget::new(sport, tournament, season);
        let span = info_span!("job", job = "ingestEventsSeason", run_id = %Uuid::new_v4());
        let result = async {
            info!("Ingesting events from {}", target);
            self.notifier
                .run_with_notification("ingestEventsSeason", true, None, self.crawler.crawl(&target, 0))
                .await
        }
        .instrument(span)
        .await;

        if let Ok(summary) = &result {
            self.publish_id_log(summary);
        }
        self.record(&result).await;
        result
    }

    /// Collect odds for a season's events that have none yet.
    pub async fn ingest_odds_season(
        &self,
        sport: &str,
        tournament: &str,
        season: &str,
    ) -> Result<GapFillSummary> {
        let target = IngestionTarget::new(sport, tournament, season);
        let span = info_span!("job", job = "ingestOddsSeason", run_id = %Uuid::new_v4());
        let result = async {
            info!("Ingesting odds for {}", target);
            self.notifier
                .run_with_notification("ingestOddsSeason", true, None, self.odds.fill_odds(&target))
                .await
        }
        .instrument(span)
        .await;

        self.record(&result).await;
        result
    }

    /// Crawl the newest season, resuming after the last stored page.
    pub async fn ingest_latest_events(&self, sport: &str, tournament: &str) -> Result<CrawlSummary> {
        let span = info_span!("job", job = "ingestLatestEvents", run_id = %Uuid::new_v4());
        let result = async {
            info!("Ingesting the latest events from {}", tournament);
            self.notifier
                .run_with_notification(
                    "ingestLatestEvents",
                    true,
                    None,
                    self.crawler.ingest_latest_events(sport, tournament),
                )
                .await
        }
        .instrument(span)
        .await;

        if let Ok(summary) = &result {
            self.publish_id_log(summary);
        }
        self.record(&result).await;
        result
    }

    /// Storage-event job: an events id log was written, fill the odds gap of
    /// the target encoded in its path.
    pub async fn ingest_odds_for_id_log(&self, path: &str) -> Result<GapFillSummary> {
        let span = info_span!("job", job = "ingestOddsBlobTrigger", run_id = %Uuid::new_v4());
        let trailer = format!("Triggered by blob:\n{}", path);
        let result = async {
            self.notifier
                .run_with_notification(
                    "ingestOddsBlobTrigger",
                    true,
                    Some(&trailer),
                    self.fill_odds_from_path(path),
                )
                .await
        }
        .instrument(span)
        .await;

        self.record(&result).await;
        result
    }

    async fn fill_odds_from_path(&self, path: &str) -> Result<GapFillSummary> {
        let (target, kind) = IngestionTarget::from_id_log_path(path)?;
        if kind != DataKind::Events {
            return Err(IngestionError::Configuration(format!(
                "odds ingestion is triggered by events id logs, got {}",
                path
            )));
        }
        info!("Ingesting odds for {} (blob trigger)", target);
        self.odds.fill_odds(&target).await
    }

    /// Daily job: latest events for every configured tournament. One target's
    /// failure does not stop the rest.
    pub async fn run_daily(&self, targets: &[TournamentRef]) -> DailyReport {
        info!("Starting daily ingestion for {} tournaments", targets.len());
        let mut report = DailyReport::default();
        for t in targets {
            match self.ingest_latest_events(&t.sport, &t.tournament).await {
                Ok(_) => report.succeeded += 1,
                Err(_) => report.failed += 1,
            }
        }
        info!(
            "Daily ingestion finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        report
    }
}
