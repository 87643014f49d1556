//! Sofascore ingestion core.
//!
//! Pulls tournament events and per-event odds from the Sofascore API into blob
//! storage, tracking what has been ingested in per-target id logs so every run
//! only fetches what is new.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod error;
pub mod id_log;
pub mod model;
pub mod notify;
pub mod odds;
pub mod schedule;
pub mod server;
pub mod service;
pub mod source;
pub mod store;

pub use crawler::{CrawlSummary, EventCrawler};
pub use error::{IngestionError, SourceError, StoreError};
pub use id_log::IdLogTracker;
pub use model::{DataKind, EventPage, IngestionOutcome, IngestionTarget, Pending};
pub use odds::{GapFillSummary, OddsGapFiller};
pub use service::IngestionService;
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore};
