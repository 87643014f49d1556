//! Outcome notifications.
//!
//! Jobs run inside [`OutcomeNotifier::run_with_notification`], which reports
//! failures (and, when asked, successes) to a chat relay. Delivery is best
//! effort: a failed dispatch is logged and never changes the job's result.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::json;
use tracing::{error, info, warn};

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `message` to `chat_ref`. Returns whether delivery succeeded.
    async fn send(&self, chat_ref: &str, message: &str) -> bool;
}

/// Posts `{"chat_id", "message"}` to a Logic Apps webhook that relays to Telegram.
pub struct LogicAppChannel {
    url: String,
    http_client: reqwest::Client,
}

impl LogicAppChannel {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create notification HTTP client")?;
        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl NotificationChannel for LogicAppChannel {
    async fn send(&self, chat_ref: &str, message: &str) -> bool {
        let payload = json!({
            "chat_id": chat_ref,
            "message": message,
        });

        match self.http_client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Notification sent through Logic Apps");
                true
            }
            Ok(resp) => {
                warn!("Notification webhook returned status {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Notification webhook request failed: {}", e);
                false
            }
        }
    }
}

/// Used when no webhook is configured.
pub struct LogOnlyChannel;

#[async_trait]
impl NotificationChannel for LogOnlyChannel {
    async fn send(&self, chat_ref: &str, message: &str) -> bool {
        info!(chat = chat_ref, "Notification (no webhook configured):\n{}", message);
        true
    }
}

pub fn failure_message(resource: &str, job_name: &str, finished_at: &str, error: &str) -> String {
    format!(
        "❌ JOB FAILURE ALERT \n\n\
         🏷️ Resource: {}\n\
         🔎 Job name: {}\n\
         🕑 Finished at: {}\n\n\
         📋 Error details:\n\
         ----------\n\
         {}\n\
         ----------\n\n\
         ⚠️ Action Required: Please check the logs and resolve the issue.",
        resource, job_name, finished_at, error
    )
}

pub fn success_message(resource: &str, job_name: &str, finished_at: &str, details: &str) -> String {
    format!(
        "✅ JOB SUCCESS\n\n\
         🏷️ Resource: {}\n\
         🔎 Job name: {}\n\
         📋 Job details: {}\n\
         🕑 Finished at: {}",
        resource, job_name, details, finished_at
    )
}

#[derive(Clone)]
pub struct OutcomeNotifier {
    channel: Arc<dyn NotificationChannel>,
    chat_id: String,
    resource: String,
    timezone: Tz,
}

impl OutcomeNotifier {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        chat_id: impl Into<String>,
        resource: impl Into<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            channel,
            chat_id: chat_id.into(),
            resource: resource.into(),
            timezone,
        }
    }

    fn finished_at(&self) -> String {
        Utc::now()
            .with_timezone(&self.timezone)
            .format("%d/%m/%Y - %H:%M:%S")
            .to_string()
    }

    /// Run `operation` and report its outcome.
    ///
    /// Failures are always reported; successes only when `notify_on_success`.
    /// `trailer` is appended to the reported text either way. The operation's
    /// result is returned untouched.
    pub async fn run_with_notification<T, E, F>(
        &self,
        job_name: &str,
        notify_on_success: bool,
        trailer: Option<&str>,
        operation: F,
    ) -> Result<T, E>
    where
        T: Display,
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let result = operation.await;
        if result.is_ok() && !notify_on_success {
            return result;
        }

        let with_trailer = |text: String| match trailer {
            Some(t) => format!("{}\n\n{}", text, t),
            None => text,
        };

        let message = match &result {
            Ok(value) => {
                info!("Job {} succeeded: {}", job_name, value);
                success_message(
                    &self.resource,
                    job_name,
                    &self.finished_at(),
                    &with_trailer(value.to_string()),
                )
            }
            Err(e) => {
                error!("Job {} failed: {}", job_name, e);
                failure_message(
                    &self.resource,
                    job_name,
                    &self.finished_at(),
                    &with_trailer(e.to_string()),
                )
            }
        };

        if !self.channel.send(&self.chat_id, &message).await {
            warn!("Could not deliver the outcome notification for job {}", job_name);
        }

        result
    }
}
