//! Channel orchestrator: runs one cycle over every feed of a channel.
//!
//! Chain heights are read once per chain per cycle and shared by the feeds of
//! that chain. A feed that is still being polled by an earlier cycle is
//! skipped rather than polled twice. A failing feed never stops the others.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::{NotifierConfig, RunMode};
use crate::error::NotifyError;
use crate::poller::{FeedPoller, PollContext, PollResult};
use crate::types::{BlockRange, Chain, EventKind, Feed};

/// A named group of feeds triggered together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub feeds: Vec<Feed>,
}

/// Caller-supplied options of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    pub range_override: Option<BlockRange>,
    pub simulate: bool,
}

/// What happened to one feed in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedOutcome {
    Completed(PollResult),
    Failed { error: String, kind: &'static str },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub feed_id: String,
    pub chain: Chain,
    pub kind: EventKind,
    pub outcome: FeedOutcome,
}

/// Per-feed results of one channel cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub channel_id: String,
    /// Unix timestamp of the cycle start.
    pub started_at: i64,
    pub duration_ms: u64,
    pub simulate: bool,
    pub feeds: Vec<FeedReport>,
}

impl CycleReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, FeedOutcome::Completed(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FeedOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FeedOutcome::Skipped { .. }))
    }

    /// Total payloads accepted by the sink across all feeds.
    pub fn events_emitted(&self) -> usize {
        self.feeds
            .iter()
            .map(|f| match &f.outcome {
                FeedOutcome::Completed(r) => r.events_emitted,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&FeedOutcome) -> bool) -> usize {
        self.feeds.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Runs channel cycles against a shared [`FeedPoller`].
pub struct ChannelOrchestrator {
    channels: Vec<Channel>,
    run_mode: RunMode,
    poller: FeedPoller,
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl ChannelOrchestrator {
    /// Validate `config` and take ownership of its channel set.
    ///
    /// `poller` should be built from `config.poller`.
    pub fn new(config: NotifierConfig, poller: FeedPoller) -> Result<Self, NotifyError> {
        config.validate()?;
        let locks = config
            .channels
            .iter()
            .flat_map(|c| c.feeds.iter())
            .map(|f| (f.id.clone(), Arc::new(Mutex::new(()))))
            .collect();
        Ok(Self {
            channels: config.channels,
            run_mode: config.run_mode,
            poller,
            locks,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Run one cycle of `channel_id`. The only error is an unknown channel.
    pub async fn run_cycle(
        &self,
        channel_id: &str,
        opts: CycleOptions,
    ) -> Result<CycleReport, NotifyError> {
        let channel = self
            .channel(channel_id)
            .ok_or_else(|| NotifyError::Config(format!("unknown channel '{channel_id}'")))?;
        Ok(self.cycle(channel, opts).await)
    }

    /// Run one cycle of every configured channel, in configuration order.
    pub async fn run_all(&self, opts: CycleOptions) -> Vec<CycleReport> {
        let mut reports = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            reports.push(self.cycle(channel, opts).await);
        }
        reports
    }

    async fn cycle(&self, channel: &Channel, opts: CycleOptions) -> CycleReport {
        let started_at = chrono::Utc::now().timestamp();
        let clock = Instant::now();
        tracing::info!(
            channel = %channel.id,
            feeds = channel.feeds.len(),
            simulate = opts.simulate,
            range = ?opts.range_override,
            "Starting cycle"
        );

        let heights = self.snapshot_heights(channel, &opts).await;

        let feeds = match self.run_mode {
            RunMode::Sequential => {
                let mut reports = Vec::with_capacity(channel.feeds.len());
                for feed in &channel.feeds {
                    reports.push(self.run_feed(feed, &opts, heights.get(&feed.chain)).await);
                }
                reports
            }
            RunMode::Concurrent => {
                join_all(
                    channel
                        .feeds
                        .iter()
                        .map(|feed| self.run_feed(feed, &opts, heights.get(&feed.chain))),
                )
                .await
            }
        };

        let report = CycleReport {
            channel_id: channel.id.clone(),
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            simulate: opts.simulate,
            feeds,
        };
        tracing::info!(
            channel = %channel.id,
            completed = report.completed(),
            failed = report.failed(),
            skipped = report.skipped(),
            emitted = report.events_emitted(),
            elapsed_ms = report.duration_ms,
            "Cycle complete"
        );
        report
    }

    /// Read each chain's height once. Override cycles need no height.
    async fn snapshot_heights(
        &self,
        channel: &Channel,
        opts: &CycleOptions,
    ) -> BTreeMap<Chain, Result<u64, NotifyError>> {
        let mut heights = BTreeMap::new();
        if opts.range_override.is_some() {
            return heights;
        }
        for feed in &channel.feeds {
            if heights.contains_key(&feed.chain) {
                continue;
            }
            let height = self.poller.current_height(feed.chain).await;
            if let Err(e) = &height {
                tracing::warn!(chain = %feed.chain, error = %e, "Chain height unavailable");
            }
            heights.insert(feed.chain, height);
        }
        heights
    }

    async fn run_feed(
        &self,
        feed: &Feed,
        opts: &CycleOptions,
        height: Option<&Result<u64, NotifyError>>,
    ) -> FeedReport {
        let lock = self.locks.get(&feed.id).cloned().unwrap_or_default();
        let outcome = match lock.try_lock() {
            Err(_) => {
                tracing::info!(feed = %feed.id, "Poll already in flight, skipping feed");
                FeedOutcome::Skipped {
                    reason: "poll already in flight".into(),
                }
            }
            Ok(_guard) => match height {
                Some(Err(e)) => FeedOutcome::Failed {
                    error: format!("chain height unavailable: {e}"),
                    kind: e.kind(),
                },
                _ => {
                    let ctx = PollContext {
                        range_override: opts.range_override,
                        simulate: opts.simulate,
                        chain_height: height.and_then(|h| h.as_ref().ok().copied()),
                    };
                    match self.poller.poll(feed, &ctx).await {
                        Ok(result) => FeedOutcome::Completed(result),
                        Err(e) => FeedOutcome::Failed {
                            error: e.cause.to_string(),
                            kind: e.cause.kind(),
                        },
                    }
                }
            },
        };

        FeedReport {
            feed_id: feed.id.clone(),
            chain: feed.chain,
            kind: feed.kind,
            outcome,
        }
    }
}
