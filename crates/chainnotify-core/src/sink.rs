//! Notification sink trait and the in-process sinks.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::NotifyError;
use crate::types::NotificationPayload;

/// Result of handing a payload to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The sink delivered or durably queued the payload.
    Accepted,
    /// The sink refused the payload (bad recipient, policy, ...).
    Rejected { reason: String },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Outbound delivery of notifications.
///
/// `Err` means the sink could not be reached; `Ok(Rejected)` means it was
/// reached and declined the payload.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn submit(&self, payload: &NotificationPayload) -> Result<SubmitOutcome, NotifyError>;
}

/// Dry-run sink: logs every payload and accepts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn submit(&self, payload: &NotificationPayload) -> Result<SubmitOutcome, NotifyError> {
        tracing::info!(
            feed = %payload.feed_id,
            recipient = %payload.recipient,
            block = payload.block_number,
            simulated = payload.is_simulated,
            title = %payload.title,
            "Notification"
        );
        Ok(SubmitOutcome::Accepted)
    }
}

/// Sink that keeps every payload in memory, for tests and embedders that
/// inspect the output.
#[derive(Debug, Default)]
pub struct MemorySink {
    payloads: Mutex<Vec<NotificationPayload>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<NotificationPayload> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NotificationPayload>> {
        // A panicking submitter cannot leave the Vec half-written.
        self.payloads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn submit(&self, payload: &NotificationPayload) -> Result<SubmitOutcome, NotifyError> {
        self.lock().push(payload.clone());
        Ok(SubmitOutcome::Accepted)
    }
}
