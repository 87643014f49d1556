//! Service configuration from the environment.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

/// Configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub catalog_path: PathBuf,
    pub targets_path: PathBuf,
    pub blob_root: PathBuf,
    /// Notifications are only logged when unset.
    pub logic_apps_url: Option<String>,
    pub telegram_chat_id: String,
    pub app_name: String,
    pub http_port: u16,
    /// If true, run the daily job once and exit (no schedule)
    pub run_once: bool,
    pub daily_run_hour: u32,
    /// Zone for the daily run hour and notification timestamps.
    pub timezone: Tz,
    pub request_timeout: Duration,
    pub requests_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> Result<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
                Some(_) => Err(anyhow!("{} is set but empty", key)),
                None => Ok(default.to_string()),
            }
        };

        let logic_apps_url = match lookup("LOGIC_APPS_URL") {
            Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            Some(_) => return Err(anyhow!("LOGIC_APPS_URL is set but empty")),
            None => None,
        };

        let daily_run_hour: u32 = parse_var("DAILY_RUN_HOUR", &get("DAILY_RUN_HOUR", "5")?)?;
        if daily_run_hour > 23 {
            return Err(anyhow!("DAILY_RUN_HOUR must be between 0 and 23, got {}", daily_run_hour));
        }

        let zone = get("NOTIFY_TIMEZONE", "America/Sao_Paulo")?;
        let timezone = zone
            .parse::<Tz>()
            .map_err(|e| anyhow!("NOTIFY_TIMEZONE has an invalid value: {:?} ({})", zone, e))?;

        Ok(Self {
            api_base_url: get("SOFASCORE_API_BASE_URL", "https://sofascore.com/api/v1")?,
            catalog_path: get("SPORTS_CATALOG_PATH", "sofascore_sports.json")?.into(),
            targets_path: get("TARGETS_PATH", "tournaments_to_ingest.json")?.into(),
            blob_root: get("BLOB_ROOT", "./data")?.into(),
            logic_apps_url,
            telegram_chat_id: lookup("TELEGRAM_CHAT_ID").unwrap_or_default(),
            app_name: get("WEBSITE_SITE_NAME", "sofascore-ingestion")?,
            http_port: parse_var("HTTP_PORT", &get("HTTP_PORT", "8083")?)?,
            run_once: get("RUN_ONCE", "false")?.to_lowercase() == "true",
            daily_run_hour,
            timezone,
            request_timeout: Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECONDS",
                &get("REQUEST_TIMEOUT_SECONDS", "10")?,
            )?),
            requests_per_minute: parse_var(
                "REQUESTS_PER_MINUTE",
                &get("REQUESTS_PER_MINUTE", "30")?,
            )?,
        })
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, value))
}

/// One entry of the daily job's target list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TournamentRef {
    pub sport: String,
    pub tournament: String,
}

pub fn load_targets(path: &Path) -> Result<Vec<TournamentRef>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read target list at {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse target list at {}", path.display()))
}
