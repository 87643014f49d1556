//! Id logs: the persisted set of entity ids already ingested per target and
//! data kind, stored as newline-delimited text.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{IngestionError, Result, StoreError};
use crate::model::{DataKind, IngestionTarget, Pending};
use crate::store::{BlobStore, Version};

/// Conditional-write attempts before giving up on a contended id log.
pub const MAX_MERGE_ATTEMPTS: u32 = 5;

/// Result of a merge: where the log lives and how it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub path: String,
    pub added: usize,
    pub total: usize,
}

#[derive(Clone)]
pub struct IdLogTracker {
    store: Arc<dyn BlobStore>,
}

impl IdLogTracker {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Current id set; a missing log is an empty set.
    pub async fn load(&self, target: &IngestionTarget, kind: DataKind) -> Result<BTreeSet<u64>> {
        let path = target.id_log_path(kind);
        self.load_path(&path).await.map(|(ids, _)| ids)
    }

    async fn load_path(&self, path: &str) -> Result<(BTreeSet<u64>, Option<Version>)> {
        match self.store.load_versioned(path).await {
            Ok((data, version)) => Ok((parse_ids(path, &data)?, Some(version))),
            Err(StoreError::NotFound(_)) => Ok((BTreeSet::new(), None)),
            Err(source) => Err(IngestionError::StorageRead {
                path: path.to_string(),
                source,
            }),
        }
    }

    /// Union `new_ids` into the persisted log.
    ///
    /// The write is conditional on the version read, so a concurrent run for
    /// the same target forces a re-read instead of being overwritten. The log
    /// is rewritten even when nothing was added; downstream storage triggers
    /// key off that write.
    pub async fn merge_and_persist(
        &self,
        target: &IngestionTarget,
        kind: DataKind,
        new_ids: &BTreeSet<u64>,
    ) -> Result<MergeReport> {
        let path = target.id_log_path(kind);

        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let (mut ids, version) = self.load_path(&path).await?;
            let before = ids.len();
            ids.extend(new_ids.iter().copied());

            match self
                .store
                .store_if(&path, format_ids(&ids).as_bytes(), version)
                .await
            {
                Ok(_) => {
                    info!(
                        "Id log {} now holds {} ids ({} new)",
                        path,
                        ids.len(),
                        ids.len() - before
                    );
                    return Ok(MergeReport {
                        path,
                        added: ids.len() - before,
                        total: ids.len(),
                    });
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(
                        "Id log {} changed during merge (attempt {}/{}), retrying",
                        path, attempt, MAX_MERGE_ATTEMPTS
                    );
                }
                Err(source) => return Err(IngestionError::StorageWrite { path, source }),
            }
        }

        Err(IngestionError::ConcurrentUpdate {
            path,
            attempts: MAX_MERGE_ATTEMPTS,
        })
    }

    /// Events that are logged but whose odds are not.
    pub async fn missing(&self, target: &IngestionTarget) -> Result<Pending> {
        let events = self.load(target, DataKind::Events).await?;
        let odds = self.load(target, DataKind::Odds).await?;
        let pending: BTreeSet<u64> = events.difference(&odds).copied().collect();

        if pending.is_empty() {
            info!("No new odds to collect for {}", target);
            Ok(Pending::NothingPending)
        } else {
            Ok(Pending::Pending(pending))
        }
    }
}

fn parse_ids(path: &str, data: &[u8]) -> Result<BTreeSet<u64>> {
    let text = String::from_utf8_lossy(data);
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<u64>().map_err(|_| IngestionError::CorruptIdLog {
                path: path.to_string(),
                line: line.to_string(),
            })
        })
        .collect()
}

fn format_ids(ids: &BTreeSet<u64>) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
