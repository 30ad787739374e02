//! Error types for the notification pipeline.

use thiserror::Error;

/// Errors that can occur while polling a feed or processing its events.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("{operation} timed out after {ms}ms")]
    Timeout { operation: String, ms: u64 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Metadata lookup failed for {token}: {reason}")]
    Metadata { token: String, reason: String },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotifyError {
    /// Short machine-readable label, used in reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Decode(_) => "decode",
            Self::Metadata { .. } => "metadata",
            Self::Sink(_) => "sink",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
        }
    }
}

/// A failed poll cycle for one feed. The cursor is left at its prior value.
#[derive(Debug, Error)]
#[error("poll of feed '{feed_id}' failed: {cause}")]
pub struct PollError {
    pub feed_id: String,
    #[source]
    pub cause: NotifyError,
}

impl PollError {
    pub fn new(feed_id: impl Into<String>, cause: NotifyError) -> Self {
        Self {
            feed_id: feed_id.into(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels() {
        assert_eq!(NotifyError::Decode("bad topic".into()).kind(), "decode");
        assert_eq!(
            NotifyError::Metadata {
                token: "0x1".into(),
                reason: "reverted".into()
            }
            .kind(),
            "metadata"
        );
        assert_eq!(NotifyError::GatewayUnavailable("down".into()).kind(), "gateway_unavailable");
        assert_eq!(NotifyError::Store("locked".into()).kind(), "store");
    }

    #[test]
    fn poll_error_display() {
        let err = PollError::new("eth-bids", NotifyError::Store("disk full".into()));
        assert_eq!(
            err.to_string(),
            "poll of feed 'eth-bids' failed: Storage error: disk full"
        );
    }
}
