//! HTTP surface: health endpoint and request-triggered single-target jobs.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::model::IngestionOutcome;
use crate::service::IngestionService;

/// Service health state
#[derive(Clone)]
pub struct HealthState {
    pub last_run_time: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub last_outcome: Arc<RwLock<Option<IngestionOutcome>>>,
    pub error_count: Arc<RwLock<usize>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            last_run_time: Arc::new(RwLock::new(None)),
            last_outcome: Arc::new(RwLock::new(None)),
            error_count: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn record(&self, outcome: IngestionOutcome) {
        *self.last_run_time.write().await = Some(Utc::now());
        if outcome.succeeded {
            *self.error_count.write().await = 0;
        } else {
            *self.error_count.write().await += 1;
        }
        *self.last_outcome.write().await = Some(outcome);
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check handler
async fn health_handler(
    State(service): State<Arc<IngestionService>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let health = service.health();
    let last_run = *health.last_run_time.read().await;
    let last_outcome = health.last_outcome.read().await.clone();
    let errors = *health.error_count.read().await;

    let status = if errors > 5 { "degraded" } else { "ok" };
    let http_status = if errors > 10 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        http_status,
        Json(json!({
            "service": "sofascore-ingestion",
            "version": env!("CARGO_PKG_VERSION"),
            "status": status,
            "last_run": last_run.map(|t| t.to_rfc3339()),
            "last_run_succeeded": last_outcome.as_ref().map(|o| o.succeeded),
            "last_run_detail": last_outcome.map(|o| o.detail),
            "consecutive_errors": errors
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct SeasonRequest {
    pub sport: String,
    pub tournament: String,
    pub season: String,
}

#[derive(Debug, Deserialize)]
pub struct TournamentRequest {
    pub sport: String,
    pub tournament: String,
}

fn respond(outcome: IngestionOutcome) -> (StatusCode, String) {
    let status = if outcome.succeeded {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, outcome.detail)
}

async fn ingest_events_season(
    State(service): State<Arc<IngestionService>>,
    Json(req): Json<SeasonRequest>,
) -> (StatusCode, String) {
    let result = service
        .ingest_events_season(&req.sport, &req.tournament, &req.season)
        .await;
    respond(IngestionOutcome::from_result(&result))
}

async fn ingest_odds_season(
    State(service): State<Arc<IngestionService>>,
    Json(req): Json<SeasonRequest>,
) -> (StatusCode, String) {
    let result = service
        .ingest_odds_season(&req.sport, &req.tournament, &req.season)
        .await;
    respond(IngestionOutcome::from_result(&result))
}

async fn ingest_latest_events(
    State(service): State<Arc<IngestionService>>,
    Json(req): Json<TournamentRequest>,
) -> (StatusCode, String) {
    let result = service
        .ingest_latest_events(&req.sport, &req.tournament)
        .await;
    respond(IngestionOutcome::from_result(&result))
}

pub fn router(service: Arc<IngestionService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ingest-events-season", post(ingest_events_season))
        .route("/ingest-odds-season", post(ingest_odds_season))
        .route("/ingest-latest-events", post(ingest_latest_events))
        .with_state(service)
}
