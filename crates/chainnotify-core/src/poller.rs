//! The feed poller, one incremental scan of one feed.
//!
//! # Cycle
//! 1. Resolve the block window: the override range verbatim, otherwise
//!    `[cursor ?? head, head]`.
//! 2. Fetch the feed's logs in that window.
//! 3. Process and submit every log (bounded concurrency); wait for all of them.
//! 4. Advance the cursor to the window's upper bound.
//!
//! A failure in any step leaves the cursor where it was.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PollerConfig;
use crate::cursor::CursorStore;
use crate::error::{NotifyError, PollError};
use crate::gateway::{LedgerGateway, MetadataResolver};
use crate::processor::EventProcessor;
use crate::sink::{NotificationSink, SubmitOutcome};
use crate::types::{BlockRange, Chain, Feed, RawEvent};

/// Per-call inputs of [`FeedPoller::poll`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollContext {
    /// Scan exactly this window instead of resuming from the cursor.
    pub range_override: Option<BlockRange>,
    /// Flag every payload as simulated.
    pub simulate: bool,
    /// Chain height already read for this cycle. Read from the gateway if absent.
    pub chain_height: Option<u64>,
}

impl PollContext {
    pub fn with_range(mut self, range: BlockRange) -> Self {
        self.range_override = Some(range);
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulate = true;
        self
    }

    pub fn at_height(mut self, height: u64) -> Self {
        self.chain_height = Some(height);
        self
    }
}

/// Outcome of a poll that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResult {
    pub feed_id: String,
    /// Window that was scanned (empty when there was nothing to do).
    pub range: BlockRange,
    /// Logs returned by the gateway.
    pub events_found: usize,
    /// Payloads the sink accepted.
    pub events_emitted: usize,
    /// Payloads the sink declined.
    pub events_rejected: usize,
    /// Events that failed to decode, enrich or submit.
    pub events_failed: usize,
    /// New cursor value, if the cursor was written.
    pub cursor_advanced_to: Option<u64>,
}

impl PollResult {
    fn new(feed_id: &str, range: BlockRange) -> Self {
        Self {
            feed_id: feed_id.to_string(),
            range,
            events_found: 0,
            events_emitted: 0,
            events_rejected: 0,
            events_failed: 0,
            cursor_advanced_to: None,
        }
    }
}

enum Dispatched {
    Emitted,
    Rejected,
    Failed,
}

/// Polls feeds against a gateway, cursor store and sink.
///
/// The poller holds no per-feed state; callers must not poll the same feed
/// twice concurrently (see [`CursorStore`]).
pub struct FeedPoller {
    gateway: Arc<dyn LedgerGateway>,
    cursors: Arc<dyn CursorStore>,
    processor: EventProcessor,
    sink: Arc<dyn NotificationSink>,
    config: PollerConfig,
}

impl FeedPoller {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        cursors: Arc<dyn CursorStore>,
        resolver: Arc<dyn MetadataResolver>,
        sink: Arc<dyn NotificationSink>,
        config: PollerConfig,
    ) -> Self {
        Self {
            processor: EventProcessor::new(resolver, &config),
            gateway,
            cursors,
            sink,
            config,
        }
    }

    /// Current height of `chain`, bounded by the RPC timeout.
    pub async fn current_height(&self, chain: Chain) -> Result<u64, NotifyError> {
        self.rpc("current_height", self.gateway.current_height(chain))
            .await
    }

    /// Run one poll cycle for `feed`.
    pub async fn poll(&self, feed: &Feed, ctx: &PollContext) -> Result<PollResult, PollError> {
        let started = Instant::now();
        match self.run(feed, ctx).await {
            Ok(result) => {
                tracing::info!(
                    feed = %feed.id,
                    chain = %feed.chain,
                    from = result.range.from,
                    to = result.range.to,
                    blocks = result.range.len(),
                    events = result.events_found,
                    emitted = result.events_emitted,
                    rejected = result.events_rejected,
                    failed = result.events_failed,
                    cursor = ?result.cursor_advanced_to,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Feed polled"
                );
                Ok(result)
            }
            Err(cause) => {
                tracing::warn!(
                    feed = %feed.id,
                    chain = %feed.chain,
                    error = %cause,
                    "Feed poll failed, cursor unchanged"
                );
                Err(PollError::new(&feed.id, cause))
            }
        }
    }

    async fn run(&self, feed: &Feed, ctx: &PollContext) -> Result<PollResult, NotifyError> {
        let range = match ctx.range_override {
            Some(range) => range,
            None => {
                let cursor = self.cursors.get(&feed.id).await?;
                let height = match ctx.chain_height {
                    Some(height) => height,
                    None => self.current_height(feed.chain).await?,
                };
                let from = cursor.map_or(height, |c| c.last_processed_block);
                BlockRange::new(from, height)
            }
        };

        let mut result = PollResult::new(&feed.id, range);
        if range.is_empty() {
            // Either an inverted override or a head that is behind the
            // cursor; neither is scanned nor moves the cursor.
            tracing::debug!(feed = %feed.id, %range, "Empty window, nothing to scan");
            return Ok(result);
        }

        let logs = self
            .rpc(
                "query_logs",
                self.gateway
                    .query_logs(feed.chain, feed.contract, feed.kind.topic0(), range),
            )
            .await?;
        result.events_found = logs.len();

        self.dispatch(feed, &logs, ctx.simulate, &mut result).await?;

        let advance = (ctx.range_override.is_none() || self.config.advance_on_override)
            && (!ctx.simulate || self.config.advance_on_simulate);
        if advance {
            self.cursors.advance(&feed.id, range.to).await?;
            result.cursor_advanced_to = Some(range.to);
        }
        Ok(result)
    }

    /// Process and submit every log, waiting for all of them.
    async fn dispatch(
        &self,
        feed: &Feed,
        logs: &[RawEvent],
        simulate: bool,
        result: &mut PollResult,
    ) -> Result<(), NotifyError> {
        if logs.is_empty() {
            return Ok(());
        }

        let all = stream::iter(logs)
            .map(|raw| self.dispatch_one(feed, raw, simulate))
            .buffer_unordered(self.config.max_concurrent_dispatch.max(1))
            .collect::<Vec<_>>();
        let outcomes = bounded("dispatch", self.config.dispatch_timeout(), all).await?;

        for outcome in outcomes {
            match outcome {
                Dispatched::Emitted => result.events_emitted += 1,
                Dispatched::Rejected => result.events_rejected += 1,
                Dispatched::Failed => result.events_failed += 1,
            }
        }
        Ok(())
    }

    async fn dispatch_one(&self, feed: &Feed, raw: &RawEvent, simulate: bool) -> Dispatched {
        let payload = match self.processor.process(raw, feed, simulate).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    feed = %feed.id,
                    block = raw.block_number,
                    tx = %raw.tx_hash,
                    log_index = raw.log_index,
                    kind = e.kind(),
                    error = %e,
                    "Skipping event"
                );
                return Dispatched::Failed;
            }
        };

        match self.sink.submit(&payload).await {
            Ok(SubmitOutcome::Accepted) => Dispatched::Emitted,
            Ok(SubmitOutcome::Rejected { reason }) => {
                tracing::warn!(
                    feed = %feed.id,
                    recipient = %payload.recipient,
                    tx = %raw.tx_hash,
                    %reason,
                    "Notification rejected by sink"
                );
                Dispatched::Rejected
            }
            Err(e) => {
                tracing::warn!(
                    feed = %feed.id,
                    recipient = %payload.recipient,
                    tx = %raw.tx_hash,
                    error = %e,
                    "Notification submit failed"
                );
                Dispatched::Failed
            }
        }
    }

    async fn rpc<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, NotifyError>>,
    ) -> Result<T, NotifyError> {
        bounded(operation, self.config.rpc_timeout(), call).await?
    }
}

async fn bounded<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, NotifyError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| NotifyError::Timeout {
            operation: operation.to_string(),
            ms: limit.as_millis() as u64,
        })
}
