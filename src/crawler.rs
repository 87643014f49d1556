//! Event crawl: walk the paginated events endpoint, persist each page, then
//! record every event id seen in the events id log.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{IngestionError, Result, SourceError};
use crate::id_log::{IdLogTracker, MergeReport};
use crate::model::{DataKind, IngestionTarget};
use crate::source::RemoteSource;
use crate::store::BlobStore;

#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub target: IngestionTarget,
    pub start_page: u32,
    pub pages_written: u32,
    pub events_seen: usize,
    pub id_log: MergeReport,
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pages_written == 0 {
            return write!(
                f,
                "No new event pages for {}, checked from page {}",
                self.target, self.start_page
            );
        }
        write!(
            f,
            "Events ingested for {}, from page {} ({} pages, {} events)",
            self.target, self.start_page, self.pages_written, self.events_seen
        )
    }
}

pub struct EventCrawler {
    source: Arc<dyn RemoteSource>,
    store: Arc<dyn BlobStore>,
    tracker: IdLogTracker,
}

impl EventCrawler {
    pub fn new(source: Arc<dyn RemoteSource>, store: Arc<dyn BlobStore>) -> Self {
        let tracker = IdLogTracker::new(store.clone());
        Self {
            source,
            store,
            tracker,
        }
    }

    /// Crawl `target` from `start_page` until the remote reports no next page.
    ///
    /// A rate-limit response ends the run immediately. A page write failure
    /// aborts before the id log is touched; pages already written stay.
    pub async fn crawl(&self, target: &IngestionTarget, start_page: u32) -> Result<CrawlSummary> {
        let (tournament_id, season_id) = self
            .source
            .resolve_ids(&target.sport, &target.tournament, &target.season)
            .await?;

        let mut page = start_page;
        let mut pages_written = 0u32;
        let mut seen: BTreeSet<u64> = BTreeSet::new();

        loop {
            info!("Fetching {} season, page {}", target, page);
            let data = match self
                .source
                .get_events_page(tournament_id, season_id, page)
                .await
            {
                Ok(data) => data,
                Err(SourceError::NotFound { url }) if page == start_page && start_page > 0 => {
                    // resuming past the last stored page: nothing new published yet
                    info!("No page {} yet for {} ({})", page, target, url);
                    break;
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        error!("Blocked by the remote API on page {}; stopping crawl", page);
                    }
                    return Err(e.into());
                }
            };

            let path = target.page_path(page);
            let body = data.raw.to_string();
            self.store
                .store(&path, body.as_bytes(), true)
                .await
                .map_err(|source| IngestionError::StorageWrite {
                    path: path.clone(),
                    source,
                })?;
            pages_written += 1;
            seen.extend(data.event_ids.iter().copied());

            if !data.has_next_page {
                break;
            }
            page += 1;
        }

        let id_log = self
            .tracker
            .merge_and_persist(target, DataKind::Events, &seen)
            .await?;

        Ok(CrawlSummary {
            target: target.clone(),
            start_page,
            pages_written,
            events_seen: seen.len(),
            id_log,
        })
    }

    /// Latest season of a tournament and the page to resume its crawl from.
    ///
    /// Stored page numbers are compared numerically, so page 10 sorts after 9.
    pub async fn resolve_start_page(
        &self,
        sport: &str,
        tournament: &str,
    ) -> Result<(IngestionTarget, u32)> {
        let season = self.source.get_latest_season(sport, tournament).await?;
        let target = IngestionTarget::new(sport, tournament, season);
        let prefix = target.raw_prefix(DataKind::Events);

        let blobs = self
            .store
            .list(&prefix)
            .await
            .map_err(|source| IngestionError::StorageRead {
                path: prefix.clone(),
                source,
            })?;

        let last_page = blobs
            .iter()
            .filter_map(|name| {
                let page = page_number(&prefix, name);
                if page.is_none() {
                    warn!("Ignoring unexpected blob {} under {}", name, prefix);
                }
                page
            })
            .max();

        let start_page = last_page.map_or(0, |p| p + 1);
        info!("Resuming {} at page {}", target, start_page);
        Ok((target, start_page))
    }

    /// Crawl the newest season of a tournament, resuming after the last stored page.
    pub async fn ingest_latest_events(&self, sport: &str, tournament: &str) -> Result<CrawlSummary> {
        let (target, start_page) = self.resolve_start_page(sport, tournament).await?;
        self.crawl(&target, start_page).await
    }
}

/// `<prefix><digits>.json` -> page number.
fn page_number(prefix: &str, name: &str) -> Option<u32> {
    let file = name.strip_prefix(prefix)?;
    let digits = file.strip_suffix(".json")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
