//! Log builders and in-memory doubles shared by the unit tests.

use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::abi;
use crate::cursor::{Cursor, CursorStore, MemoryCursorStore};
use crate::error::NotifyError;
use crate::gateway::{LedgerGateway, MetadataResolver};
use crate::sink::{NotificationSink, SubmitOutcome};
use crate::types::{BlockRange, Chain, EventKind, Feed, NotificationPayload, RawEvent};

pub const MARKETPLACE: Address = address!("8e5660b4ab70168b5a6feea0e0315cb49c8cd539");
pub const BIDS: Address = address!("e479dfd9664c693b2e2992300930b00bfde08233");
pub const NFT: Address = address!("f87e31492faf9a91b02ee0deaad50d51d56d5d4d");

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn order_feed(id: &str, chain: Chain) -> Feed {
    Feed::new(id, chain, EventKind::OrderFilled, MARKETPLACE)
}

pub fn bid_feed(id: &str, chain: Chain, kind: EventKind) -> Feed {
    Feed::new(id, chain, kind, BIDS)
}

fn raw_event(chain: Chain, contract: Address, block: u64, log: alloy_primitives::LogData) -> RawEvent {
    RawEvent {
        chain,
        contract,
        block_number: block,
        tx_hash: B256::left_padding_from(&block.to_be_bytes()),
        log_index: 0,
        topics: log.topics().to_vec(),
        data: log.data,
    }
}

/// `OrderSuccessful` emitted by [`MARKETPLACE`]; the asset id is the block number.
pub fn order_filled_log(
    chain: Chain,
    block: u64,
    nft: Address,
    seller: Address,
    buyer: Address,
    price: U256,
) -> RawEvent {
    let ev = abi::OrderSuccessful {
        id: B256::repeat_byte(0x01),
        assetId: U256::from(block),
        seller,
        nftAddress: nft,
        totalPrice: price,
        buyer,
    };
    raw_event(chain, MARKETPLACE, block, ev.encode_log_data())
}

/// `BidCreated` emitted by [`BIDS`].
pub fn bid_created_log(
    chain: Chain,
    block: u64,
    token: Address,
    token_id: U256,
    bidder: Address,
    price: U256,
) -> RawEvent {
    let ev = abi::BidCreated {
        id: B256::repeat_byte(0x02),
        tokenAddress: token,
        tokenId: token_id,
        bidder,
        price,
        expiresAt: U256::from(4_102_444_800u64),
        fingerprint: Bytes::new(),
    };
    raw_event(chain, BIDS, block, ev.encode_log_data())
}

/// `BidAccepted` emitted by [`BIDS`].
pub fn bid_accepted_log(
    chain: Chain,
    block: u64,
    token: Address,
    token_id: U256,
    bidder: Address,
    seller: Address,
    price: U256,
) -> RawEvent {
    let ev = abi::BidAccepted {
        id: B256::repeat_byte(0x03),
        tokenAddress: token,
        tokenId: token_id,
        bidder,
        seller,
        price,
        fee: U256::ZERO,
    };
    raw_event(chain, BIDS, block, ev.encode_log_data())
}

// ─── Gateway ──────────────────────────────────────────────────────────────────

/// Serves a fixed set of logs and heights; records every log query.
#[derive(Default)]
pub struct MockGateway {
    heights: Mutex<HashMap<Chain, u64>>,
    logs: Vec<RawEvent>,
    failing: AtomicBool,
    query_delay: Option<Duration>,
    queries: Mutex<Vec<(Chain, BlockRange)>>,
    height_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(self, chain: Chain, height: u64) -> Self {
        self.set_height(chain, height);
        self
    }

    pub fn logs(mut self, logs: impl IntoIterator<Item = RawEvent>) -> Self {
        self.logs.extend(logs);
        self
    }

    pub fn query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    pub fn set_height(&self, chain: Chain, height: u64) {
        self.heights.lock().unwrap().insert(chain, height);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<(Chain, BlockRange)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn height_calls(&self) -> usize {
        self.height_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(NotifyError::GatewayUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn current_height(&self, chain: Chain) -> Result<u64, NotifyError> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.heights
            .lock()
            .unwrap()
            .get(&chain)
            .copied()
            .ok_or_else(|| NotifyError::GatewayUnavailable(format!("no node for {chain}")))
    }

    async fn query_logs(
        &self,
        chain: Chain,
        contract: Address,
        topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, NotifyError> {
        self.queries.lock().unwrap().push((chain, range));
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(self
            .logs
            .iter()
            .filter(|log| {
                log.chain == chain
                    && log.contract == contract
                    && log.topics.first() == Some(&topic0)
                    && range.contains(log.block_number)
            })
            .cloned()
            .collect())
    }
}

// ─── Cursor store ─────────────────────────────────────────────────────────────

/// Memory store whose reads or writes fail for chosen feeds.
pub struct FaultyStore {
    inner: MemoryCursorStore,
    fail_get: HashSet<String>,
    fail_advance: HashSet<String>,
}

impl FaultyStore {
    pub fn new(inner: MemoryCursorStore) -> Self {
        Self {
            inner,
            fail_get: HashSet::new(),
            fail_advance: HashSet::new(),
        }
    }

    pub fn fail_get(mut self, feed_id: &str) -> Self {
        self.fail_get.insert(feed_id.to_string());
        self
    }

    pub fn fail_advance(mut self, feed_id: &str) -> Self {
        self.fail_advance.insert(feed_id.to_string());
        self
    }

    /// Stored value, bypassing the read fault.
    pub async fn stored(&self, feed_id: &str) -> Option<u64> {
        self.inner
            .get(feed_id)
            .await
            .ok()
            .flatten()
            .map(|c| c.last_processed_block)
    }
}

#[async_trait]
impl CursorStore for FaultyStore {
    async fn get(&self, feed_id: &str) -> Result<Option<Cursor>, NotifyError> {
        if self.fail_get.contains(feed_id) {
            return Err(NotifyError::Store("database is locked".into()));
        }
        self.inner.get(feed_id).await
    }

    async fn advance(&self, feed_id: &str, block_number: u64) -> Result<(), NotifyError> {
        if self.fail_advance.contains(feed_id) {
            return Err(NotifyError::Store("disk full".into()));
        }
        self.inner.advance(feed_id, block_number).await
    }

    async fn list(&self) -> Result<Vec<Cursor>, NotifyError> {
        self.inner.list().await
    }

    async fn reset(&self, feed_id: &str) -> Result<(), NotifyError> {
        self.inner.reset(feed_id).await
    }
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

/// Answers from static tables; unknown tokens are metadata errors.
#[derive(Default)]
pub struct MockResolver {
    names: HashMap<Address, String>,
    owners: HashMap<(Address, U256), Address>,
    decimals: HashMap<Address, u8>,
    delay: Option<Duration>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, token: Address, name: &str) -> Self {
        self.names.insert(token, name.to_string());
        self
    }

    pub fn owner(mut self, token: Address, token_id: u64, owner: Address) -> Self {
        self.owners.insert((token, U256::from(token_id)), owner);
        self
    }

    pub fn decimals(mut self, token: Address, decimals: u8) -> Self {
        self.decimals.insert(token, decimals);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn unknown(token: Address) -> NotifyError {
    NotifyError::Metadata {
        token: token.to_string(),
        reason: "unknown token".into(),
    }
}

#[async_trait]
impl MetadataResolver for MockResolver {
    async fn asset_name(&self, _chain: Chain, token: Address) -> Result<String, NotifyError> {
        self.pause().await;
        self.names.get(&token).cloned().ok_or_else(|| unknown(token))
    }

    async fn asset_owner(
        &self,
        _chain: Chain,
        token: Address,
        token_id: U256,
    ) -> Result<Address, NotifyError> {
        self.pause().await;
        self.owners
            .get(&(token, token_id))
            .copied()
            .ok_or_else(|| unknown(token))
    }

    async fn decimals(&self, _chain: Chain, token: Address) -> Result<u8, NotifyError> {
        self.pause().await;
        self.decimals.get(&token).copied().ok_or_else(|| unknown(token))
    }
}

// ─── Sinks ────────────────────────────────────────────────────────────────────

/// Rejects payloads for listed recipients, errors for others, accepts the rest.
#[derive(Default)]
pub struct ScriptedSink {
    reject: HashSet<Address>,
    fail: HashSet<Address>,
    accepted: Mutex<Vec<NotificationPayload>>,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(mut self, recipient: Address) -> Self {
        self.reject.insert(recipient);
        self
    }

    pub fn fail(mut self, recipient: Address) -> Self {
        self.fail.insert(recipient);
        self
    }

    pub fn accepted(&self) -> Vec<NotificationPayload> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for ScriptedSink {
    async fn submit(&self, payload: &NotificationPayload) -> Result<SubmitOutcome, NotifyError> {
        if self.fail.contains(&payload.recipient) {
            return Err(NotifyError::Sink("503 from push service".into()));
        }
        if self.reject.contains(&payload.recipient) {
            return Ok(SubmitOutcome::Rejected {
                reason: "recipient not subscribed".into(),
            });
        }
        self.accepted.lock().unwrap().push(payload.clone());
        Ok(SubmitOutcome::Accepted)
    }
}
