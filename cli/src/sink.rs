//! Sink selection and the HTTP webhook sink.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use chainnotify_core::{LogSink, NotificationPayload, NotificationSink, NotifyError, SubmitOutcome};

/// Where notifications go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// Log every payload (dry run).
    #[default]
    Log,
    /// POST every payload as JSON to `url`.
    Webhook {
        url: String,
        #[serde(default = "default_webhook_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_webhook_timeout_ms() -> u64 {
    10_000
}

impl SinkConfig {
    pub fn build(&self) -> Result<Arc<dyn NotificationSink>, NotifyError> {
        Ok(match self {
            Self::Log => Arc::new(LogSink),
            Self::Webhook { url, timeout_ms } => Arc::new(WebhookSink::new(
                url.clone(),
                Duration::from_millis(*timeout_ms),
            )?),
        })
    }
}

/// Posts payloads to an HTTP endpoint.
///
/// 2xx is accepted, 4xx is a rejection, anything else is a sink error.
/// Simulated payloads are logged and never posted.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("webhook client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn submit(&self, payload: &NotificationPayload) -> Result<SubmitOutcome, NotifyError> {
        if payload.is_simulated {
            info!(
                feed = %payload.feed_id,
                recipient = %payload.recipient,
                title = %payload.title,
                "Simulated notification, not posted"
            );
            return Ok(SubmitOutcome::Accepted);
        }

        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Sink(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            debug!(feed = %payload.feed_id, recipient = %payload.recipient, "Webhook accepted notification");
            return Ok(SubmitOutcome::Accepted);
        }

        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            Ok(SubmitOutcome::Rejected {
                reason: format!("HTTP {status}: {body}"),
            })
        } else {
            Err(NotifyError::Sink(format!("HTTP {status}: {body}")))
        }
    }
}
