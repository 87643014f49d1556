//! Odds gap-fill: fetch odds for every logged event that has none yet.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{IngestionError, Result, SourceError};
use crate::id_log::{IdLogTracker, MergeReport};
use crate::model::{DataKind, IngestionTarget, Pending};
use crate::source::RemoteSource;
use crate::store::BlobStore;

#[derive(Debug, Clone)]
pub enum GapFillSummary {
    NothingPending {
        target: IngestionTarget,
    },
    Ingested {
        target: IngestionTarget,
        ingested: usize,
        not_found: BTreeSet<u64>,
        id_log: MergeReport,
    },
}

impl GapFillSummary {
    pub fn ingested(&self) -> usize {
        match self {
            GapFillSummary::NothingPending { .. } => 0,
            GapFillSummary::Ingested { ingested, .. } => *ingested,
        }
    }

    pub fn not_found(&self) -> usize {
        match self {
            GapFillSummary::NothingPending { .. } => 0,
            GapFillSummary::Ingested { not_found, .. } => not_found.len(),
        }
    }
}

impl fmt::Display for GapFillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapFillSummary::NothingPending { target } => {
                write!(f, "No new odds to collect for {}", target)
            }
            GapFillSummary::Ingested {
                target,
                ingested,
                not_found,
                ..
            } => {
                write!(f, "Odds ingested for {} from {} events", target, ingested)?;
                if !not_found.is_empty() {
                    write!(f, ".\n{} events were not found in Sofascore.", not_found.len())?;
                }
                Ok(())
            }
        }
    }
}

pub struct OddsGapFiller {
    source: Arc<dyn RemoteSource>,
    store: Arc<dyn BlobStore>,
    tracker: IdLogTracker,
}

impl OddsGapFiller {
    pub fn new(source: Arc<dyn RemoteSource>, store: Arc<dyn BlobStore>) -> Self {
        let tracker = IdLogTracker::new(store.clone());
        Self {
            source,
            store,
            tracker,
        }
    }

    /// Fetch and persist odds for `events - odds`.
    ///
    /// A 404 for one event is recorded and skipped. Any other failure aborts
    /// the run without updating the odds log, so odds already written in this
    /// run are fetched again next time.
    pub async fn fill_odds(&self, target: &IngestionTarget) -> Result<GapFillSummary> {
        let pending = match self.tracker.missing(target).await? {
            Pending::NothingPending => {
                return Ok(GapFillSummary::NothingPending {
                    target: target.clone(),
                })
            }
            Pending::Pending(ids) => ids,
        };
        info!("Collecting odds for {} events of {}", pending.len(), target);

        let mut inserted: BTreeSet<u64> = BTreeSet::new();
        let mut not_found: BTreeSet<u64> = BTreeSet::new();

        for event_id in pending {
            let odds = match self.source.get_odds(event_id).await {
                Ok(odds) => odds,
                Err(SourceError::NotFound { .. }) => {
                    warn!("Odds for event {} not found, skipping", event_id);
                    not_found.insert(event_id);
                    continue;
                }
                Err(e) => {
                    error!("Odds fetch for event {} failed: {}", event_id, e);
                    return Err(e.into());
                }
            };

            let path = target.odds_path(event_id);
            self.store
                .store(&path, odds.to_string().as_bytes(), true)
                .await
                .map_err(|source| IngestionError::StorageWrite {
                    path: path.clone(),
                    source,
                })?;
            inserted.insert(event_id);
        }

        let id_log = self
            .tracker
            .merge_and_persist(target, DataKind::Odds, &inserted)
            .await?;

        Ok(GapFillSummary::Ingested {
            target: target.clone(),
            ingested: inserted.len(),
            not_found,
            id_log,
        })
    }
}
