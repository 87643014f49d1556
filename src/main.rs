//! Sofascore Ingestion Service
//!
//! Daily incremental crawl of tournament events into blob storage, followed
//! by odds gap-fill for every event whose odds are not collected yet.
//! Also serves a health endpoint and request-triggered single-target jobs.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use sofascore_ingestion::catalog::SportsCatalog;
use sofascore_ingestion::config::{load_targets, Config};
use sofascore_ingestion::notify::{
    LogOnlyChannel, LogicAppChannel, NotificationChannel, OutcomeNotifier,
};
use sofascore_ingestion::schedule::until_next_run;
use sofascore_ingestion::server::router;
use sofascore_ingestion::service::ID_LOG_QUEUE_CAPACITY;
use sofascore_ingestion::source::SofascoreClient;
use sofascore_ingestion::{BlobStore, FsBlobStore, IngestionService};

/// Run the daily job at the configured hour until the process is stopped.
async fn run_schedule(service: Arc<IngestionService>, config: Config) {
    loop {
        let wait = until_next_run(Utc::now(), config.daily_run_hour, config.timezone);
        info!("Next daily ingestion in {}s", wait.as_secs());
        tokio::time::sleep(wait).await;

        // Re-read the target list so edits apply without a restart
        match load_targets(&config.targets_path) {
            Ok(targets) => {
                service.run_daily(&targets).await;
            }
            Err(e) => error!("Daily ingestion skipped: {:?}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local runs may keep settings in .env; deployed environments set them directly
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env file");
        }
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sofascore_ingestion=info".parse()?),
        )
        .init();

    info!("Sofascore Ingestion Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let catalog = SportsCatalog::from_file(&config.catalog_path)?;
    let source = Arc::new(SofascoreClient::new(
        config.api_base_url.clone(),
        catalog,
        config.request_timeout,
        config.requests_per_minute,
    )?);
    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.blob_root.clone()));
    info!("Blob store rooted at {}", config.blob_root.display());

    let channel: Arc<dyn NotificationChannel> = match &config.logic_apps_url {
        Some(url) => Arc::new(LogicAppChannel::new(url.clone())?),
        None => {
            warn!("LOGIC_APPS_URL not set; notifications will only be logged");
            Arc::new(LogOnlyChannel)
        }
    };
    let notifier = OutcomeNotifier::new(
        channel,
        config.telegram_chat_id.clone(),
        config.app_name.clone(),
        config.timezone,
    );

    let (id_log_tx, mut id_log_rx) = mpsc::channel::<String>(ID_LOG_QUEUE_CAPACITY);
    let service = Arc::new(
        IngestionService::new(source, store, notifier).with_id_log_events(id_log_tx),
    );

    // Start HTTP server (health + request triggers)
    let app = router(service.clone());
    let addr = format!("0.0.0.0:{}", config.http_port);
    info!("HTTP endpoint listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server stopped: {:?}", e);
        }
    });

    if config.run_once {
        info!("Running in one-shot mode (RUN_ONCE=true)");
        let targets = load_targets(&config.targets_path)?;
        let report = service.run_daily(&targets).await;

        // Run the odds jobs the crawls triggered before exiting
        while let Ok(path) = id_log_rx.try_recv() {
            let _ = service.ingest_odds_for_id_log(&path).await;
        }
        if report.failed > 0 {
            return Err(anyhow::anyhow!(
                "{} of {} targets failed",
                report.failed,
                report.failed + report.succeeded
            ));
        }
        return Ok(());
    }

    // Storage trigger: every events id log write starts an odds gap-fill
    let odds_service = service.clone();
    tokio::spawn(async move {
        while let Some(path) = id_log_rx.recv().await {
            // outcome is already notified and recorded by the job
            let _ = odds_service.ingest_odds_for_id_log(&path).await;
        }
    });

    // Handle shutdown gracefully (continuous mode)
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        _ = run_schedule(service, config) => {}
        _ = ctrl_c => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
