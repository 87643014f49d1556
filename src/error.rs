//! Error taxonomy for the ingestion core.
//!
//! Only `SourceError::NotFound` during odds gap-fill is recovered locally;
//! every other variant aborts the enclosing job and is surfaced through the
//! outcome notifier.

use thiserror::Error;

/// Blob store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),

    /// A conditional write found a different version than expected.
    #[error("blob {0} was modified concurrently")]
    Conflict(String),

    #[error("blob io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Remote data source failures.
#[derive(Debug, Error)]
pub enum SourceError {
    /// 403/429 from the remote API. We are blocked for now, so stop.
    #[error("rate limited or forbidden (status {status}) for {url}")]
    RateLimited { status: u16, url: String },

    #[error("resource not found: {url}")]
    NotFound { url: String },

    /// Unknown sport, tournament or season in the catalog.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("remote source error: {0}")]
    Other(String),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }
}

/// Terminal failure of an ingestion job.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to read blob {path}: {source}")]
    StorageRead {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to write blob {path}: {source}")]
    StorageWrite {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("id log {path} contains an invalid line: {line:?}")]
    CorruptIdLog { path: String, line: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("id log {path} kept changing underneath us ({attempts} attempts)")]
    ConcurrentUpdate { path: String, attempts: u32 },
}

impl IngestionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, IngestionError::Source(e) if e.is_rate_limited())
    }
}

pub type Result<T, E = IngestionError> = std::result::Result<T, E>;
