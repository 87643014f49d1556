#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use sofascore_ingestion::catalog::SportsCatalog;
use sofascore_ingestion::notify::{NotificationChannel, OutcomeNotifier};
use sofascore_ingestion::source::RemoteSource;
use sofascore_ingestion::store::Version;
use sofascore_ingestion::{BlobStore, EventPage, MemoryBlobStore, SourceError, StoreError};

pub const NBA_ID: u64 = 132;
pub const SEASON_2024_ID: u64 = 65360;

/// Scripted response of the fake remote API.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    RateLimited,
    NotFound,
    Broken,
}

impl Reply {
    fn into_result(self, url: String) -> Result<Value, SourceError> {
        match self {
            Reply::Json(v) => Ok(v),
            Reply::RateLimited => Err(SourceError::RateLimited { status: 403, url }),
            Reply::NotFound => Err(SourceError::NotFound { url }),
            Reply::Broken => Err(SourceError::Other(format!("{} returned status 500", url))),
        }
    }
}

pub fn page(ids: &[u64], has_next_page: bool) -> Reply {
    let events: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "slug": format!("event-{}", id)}))
        .collect();
    Reply::Json(json!({"events": events, "hasNextPage": has_next_page}))
}

pub fn odds(id: u64) -> Reply {
    Reply::Json(json!({"eventId": id, "markets": [{"marketName": "Full time"}]}))
}

pub struct FakeSource {
    catalog: SportsCatalog,
    pages: Mutex<HashMap<u32, Reply>>,
    odds: Mutex<HashMap<u64, Reply>>,
    pub fetched_pages: Mutex<Vec<u32>>,
    pub fetched_odds: Mutex<Vec<u64>>,
}

impl FakeSource {
    pub fn new() -> Self {
        let catalog = serde_json::from_value(json!({
            "sports": [{
                "name": "Basketball",
                "tournaments": [{
                    "name": "NBA",
                    "id": NBA_ID,
                    "seasons": [
                        {"id": SEASON_2024_ID, "value": "2024/2025"},
                        {"id": 54105, "value": "2023/2024"}
                    ]
                }]
            }]
        }))
        .unwrap();
        Self {
            catalog,
            pages: Mutex::new(HashMap::new()),
            odds: Mutex::new(HashMap::new()),
            fetched_pages: Mutex::new(Vec::new()),
            fetched_odds: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(self, n: u32, reply: Reply) -> Self {
        self.pages.lock().unwrap().insert(n, reply);
        self
    }

    pub fn with_odds(self, id: u64, reply: Reply) -> Self {
        self.odds.lock().unwrap().insert(id, reply);
        self
    }

    pub fn set_page(&self, n: u32, reply: Reply) {
        self.pages.lock().unwrap().insert(n, reply);
    }

    pub fn pages_fetched(&self) -> Vec<u32> {
        self.fetched_pages.lock().unwrap().clone()
    }

    pub fn odds_fetched(&self) -> Vec<u64> {
        self.fetched_odds.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn resolve_ids(
        &self,
        sport: &str,
        tournament: &str,
        season: &str,
    ) -> Result<(u64, u64), SourceError> {
        self.catalog.resolve_ids(sport, tournament, season)
    }

    async fn get_latest_season(&self, sport: &str, tournament: &str) -> Result<String, SourceError> {
        self.catalog.latest_season(sport, tournament)
    }

    async fn get_events_page(
        &self,
        tournament_id: u64,
        season_id: u64,
        page: u32,
    ) -> Result<EventPage, SourceError> {
        self.fetched_pages.lock().unwrap().push(page);
        let url = format!(
            "fake://unique-tournament/{}/season/{}/events/last/{}",
            tournament_id, season_id, page
        );
        let reply = self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or(Reply::NotFound);
        EventPage::from_json(reply.into_result(url)?)
    }

    async fn get_odds(&self, event_id: u64) -> Result<Value, SourceError> {
        self.fetched_odds.lock().unwrap().push(event_id);
        let url = format!("fake://event/{}/odds/1/all", event_id);
        let reply = self
            .odds
            .lock()
            .unwrap()
            .get(&event_id)
            .cloned()
            .unwrap_or(Reply::NotFound);
        reply.into_result(url)
    }
}

/// Memory store whose plain writes fail for paths ending in `failing_suffix`.
pub struct FailingStore {
    pub inner: Arc<MemoryBlobStore>,
    failing_suffix: String,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryBlobStore>, failing_suffix: impl Into<String>) -> Self {
        Self {
            inner,
            failing_suffix: failing_suffix.into(),
        }
    }
}

#[async_trait]
impl BlobStore for FailingStore {
    async fn load_versioned(&self, path: &str) -> Result<(Vec<u8>, Version), StoreError> {
        self.inner.load_versioned(path).await
    }

    async fn store_if(
        &self,
        path: &str,
        data: &[u8],
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        self.inner.store_if(path, data, expected).await
    }

    async fn store(&self, path: &str, data: &[u8], overwrite: bool) -> Result<(), StoreError> {
        if path.ends_with(&self.failing_suffix) {
            return Err(StoreError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.store(path, data, overwrite).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix).await
    }
}

#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, _chat_ref: &str, message: &str) -> bool {
        self.sent.lock().unwrap().push(message.to_string());
        true
    }
}

pub fn notifier(channel: Arc<RecordingChannel>) -> OutcomeNotifier {
    OutcomeNotifier::new(
        channel,
        "-100123",
        "sofascore-ingestion-test",
        chrono_tz::America::Sao_Paulo,
    )
}
