//! Remote data source: the Sofascore JSON API.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::SportsCatalog;
use crate::error::SourceError;
use crate::model::EventPage;

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Map names to `(unique_tournament_id, season_id)`.
    async fn resolve_ids(
        &self,
        sport: &str,
        tournament: &str,
        season: &str,
    ) -> Result<(u64, u64), SourceError>;

    async fn get_latest_season(&self, sport: &str, tournament: &str)
        -> Result<String, SourceError>;

    async fn get_events_page(
        &self,
        tournament_id: u64,
        season_id: u64,
        page: u32,
    ) -> Result<EventPage, SourceError>;

    async fn get_odds(&self, event_id: u64) -> Result<Value, SourceError>;
}

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct SofascoreClient {
    base_url: String,
    catalog: SportsCatalog,
    http_client: reqwest::Client,
    rate_limiter: DirectLimiter,
}

impl SofascoreClient {
    pub fn new(
        base_url: impl Into<String>,
        catalog: SportsCatalog,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> anyhow::Result<Self> {
        let per_minute = NonZeroU32::new(requests_per_minute)
            .ok_or_else(|| anyhow!("REQUESTS_PER_MINUTE must be greater than zero"))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            catalog,
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    fn events_url(&self, tournament_id: u64, season_id: u64, page: u32) -> String {
        format!(
            "{}/unique-tournament/{}/season/{}/events/last/{}",
            self.base_url, tournament_id, season_id, page
        )
    }

    fn odds_url(&self, event_id: u64) -> String {
        format!("{}/event/{}/odds/1/all", self.base_url, event_id)
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, SourceError> {
        self.rate_limiter.until_ready().await;

        info!("Running GET request for {}", url);
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Other(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Other(format!("failed to read body of {}: {}", url, e)))?;

        if let Some(err) = classify_status(status, url, &body) {
            warn!("GET {} returned {}", url, status);
            return Err(err);
        }

        serde_json::from_str(&body)
            .map_err(|e| SourceError::Other(format!("invalid JSON from {}: {}", url, e)))
    }
}

/// Map a non-success HTTP status to the error kind callers branch on.
pub fn classify_status(status: StatusCode, url: &str, body: &str) -> Option<SourceError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited {
            status: status.as_u16(),
            url: url.to_string(),
        },
        StatusCode::NOT_FOUND => SourceError::NotFound {
            url: url.to_string(),
        },
        _ => SourceError::Other(format!("{} returned status {}: {}", url, status, body)),
    })
}

#[async_trait]
impl RemoteSource for SofascoreClient {
    async fn resolve_ids(
        &self,
        sport: &str,
        tournament: &str,
        season: &str,
    ) -> Result<(u64, u64), SourceError> {
        self.catalog.resolve_ids(sport, tournament, season)
    }

    async fn get_latest_season(
        &self,
        sport: &str,
        tournament: &str,
    ) -> Result<String, SourceError> {
        self.catalog.latest_season(sport, tournament)
    }

    async fn get_events_page(
        &self,
        tournament_id: u64,
        season_id: u64,
        page: u32,
    ) -> Result<EventPage, SourceError> {
        let url = self.events_url(tournament_id, season_id, page);
        let raw = self.fetch_json(&url).await?;
        EventPage::from_json(raw)
    }

    async fn get_odds(&self, event_id: u64) -> Result<Value, SourceError> {
        let url = self.odds_url(event_id);
        self.fetch_json(&url).await
    }
}
