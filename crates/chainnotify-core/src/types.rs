//! Shared types for the notification pipeline.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifyError;

// ─── Chain ────────────────────────────────────────────────────────────────────

/// The networks a channel can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Ethereum mainnet (primary network).
    Ethereum,
    /// Polygon PoS (secondary network).
    Polygon,
}

impl Chain {
    /// Stable lowercase slug (`"ethereum"`, `"polygon"`).
    pub fn slug(self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Polygon => "polygon",
        }
    }

    /// Human-readable name used in notification text.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ethereum => "Ethereum",
            Self::Polygon => "Polygon (MATIC)",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.slug())
    }
}

impl FromStr for Chain {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Self::Ethereum),
            "polygon" | "matic" => Ok(Self::Polygon),
            other => Err(NotifyError::Config(format!("unknown chain '{other}'"))),
        }
    }
}

// ─── EventKind ────────────────────────────────────────────────────────────────

/// The marketplace events a feed can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A marketplace order was executed (`OrderSuccessful`).
    OrderFilled,
    /// A bid was placed on an asset (`BidCreated`).
    BidCreated,
    /// The asset owner accepted a bid (`BidAccepted`).
    BidAccepted,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [Self::OrderFilled, Self::BidCreated, Self::BidAccepted];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderFilled => "order_filled",
            Self::BidCreated => "bid_created",
            Self::BidAccepted => "bid_accepted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ─── Feed ─────────────────────────────────────────────────────────────────────

/// One (chain, event kind, contract) combination, polled independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Stable identifier, also the cursor key.
    pub id: String,
    pub chain: Chain,
    pub kind: EventKind,
    /// Contract emitting the events.
    pub contract: Address,
    /// ERC-20 the price is denominated in. `None` = default decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<Address>,
}

impl Feed {
    pub fn new(id: impl Into<String>, chain: Chain, kind: EventKind, contract: Address) -> Self {
        Self {
            id: id.into(),
            chain,
            kind,
            contract,
            payment_token: None,
        }
    }

    pub fn with_payment_token(mut self, token: Address) -> Self {
        self.payment_token = Some(token);
        self
    }
}

// ─── BlockRange ───────────────────────────────────────────────────────────────

/// Inclusive `[from, to]` window scanned in one poll cycle.
///
/// `from > to` is a valid, empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Returns `true` if the window contains no blocks.
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Number of blocks in the window.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.from && block <= self.to
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

// ─── RawEvent ─────────────────────────────────────────────────────────────────

/// An undecoded log matched by a feed's filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub chain: Chain,
    /// Contract that emitted the log.
    pub contract: Address,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    /// `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters.
    pub data: Bytes,
}

// ─── NotificationPayload ─────────────────────────────────────────────────────

/// Category shared by every notification emitted by marketplace channels.
pub const NOTIFICATION_CATEGORY: u8 = 3;

/// The normalized unit handed to a [`NotificationSink`](crate::sink::NotificationSink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipient: Address,
    pub title: String,
    pub short_message: String,
    pub long_message: String,
    pub category: u8,
    pub is_simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Feed that produced the payload.
    pub feed_id: String,
    pub block_number: u64,
    pub tx_hash: B256,
}

// ─── Amount formatting ───────────────────────────────────────────────────────

/// Rescale an integer amount in the smallest on-chain unit to a decimal string.
///
/// Trailing fractional zeros are trimmed; whole amounts render as `N.0`.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let scale = decimals as usize;
    if scale == 0 {
        return format!("{digits}.0");
    }

    let (int_part, frac_part) = if digits.len() > scale {
        let split = digits.len() - scale;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = scale))
    };

    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        format!("{int_part}.0")
    } else {
        format!("{int_part}.{frac_part}")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
