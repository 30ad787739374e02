//! Poller and orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::NotifyError;
use crate::orchestrator::Channel;

/// Settings for a [`FeedPoller`](crate::poller::FeedPoller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Deadline for each gateway call (height, logs).
    pub rpc_timeout_ms: u64,
    /// Deadline for each metadata lookup (name, owner, decimals).
    pub metadata_timeout_ms: u64,
    /// Deadline for the whole dispatch phase of one cycle.
    pub dispatch_timeout_ms: u64,
    /// Maximum number of events processed and submitted concurrently.
    pub max_concurrent_dispatch: usize,
    /// Decimals used when a feed has no payment token.
    pub default_decimals: u8,
    /// Persist the cursor after an override-range cycle.
    pub advance_on_override: bool,
    /// Persist the cursor after a simulated cycle.
    pub advance_on_simulate: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 30_000,
            metadata_timeout_ms: 10_000,
            dispatch_timeout_ms: 300_000,
            max_concurrent_dispatch: 8,
            default_decimals: 18,
            advance_on_override: true,
            advance_on_simulate: true,
        }
    }
}

impl PollerConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// How the feeds of one channel are polled within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One feed after the other, in configuration order.
    #[default]
    Sequential,
    /// All feeds of the channel at once.
    Concurrent,
}

/// Top-level configuration: poller settings plus the static channel/feed set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub poller: PollerConfig,
    pub run_mode: RunMode,
    pub channels: Vec<Channel>,
}

impl NotifierConfig {
    /// Check that channel and feed ids are unique and limits are sane.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.poller.max_concurrent_dispatch == 0 {
            return Err(NotifyError::Config(
                "poller.max_concurrent_dispatch must be at least 1".into(),
            ));
        }

        let mut channel_ids = HashSet::new();
        let mut feed_ids = HashSet::new();
        for channel in &self.channels {
            if !channel_ids.insert(channel.id.as_str()) {
                return Err(NotifyError::Config(format!(
                    "duplicate channel id '{}'",
                    channel.id
                )));
            }
            if channel.feeds.is_empty() {
                return Err(NotifyError::Config(format!(
                    "channel '{}' has no feeds",
                    channel.id
                )));
            }
            // Feed ids are cursor keys, so they must be unique across channels.
            for feed in &channel.feeds {
                if !feed_ids.insert(feed.id.as_str()) {
                    return Err(NotifyError::Config(format!(
                        "duplicate feed id '{}'",
                        feed.id
                    )));
                }
            }
        }
        Ok(())
    }
}
