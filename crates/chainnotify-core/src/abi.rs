//! Marketplace and bid event ABIs, and decoding of raw logs into [`MarketEvent`]s.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};

use crate::error::NotifyError;
use crate::types::{EventKind, RawEvent};

sol! {
    /// Emitted by the marketplace when an order is executed.
    event OrderSuccessful(
        bytes32 id,
        uint256 indexed assetId,
        address indexed seller,
        address nftAddress,
        uint256 totalPrice,
        address indexed buyer
    );

    /// Emitted by the bid contract when a bid is placed on an asset.
    event BidCreated(
        bytes32 id,
        address indexed tokenAddress,
        uint256 indexed tokenId,
        address indexed bidder,
        uint256 price,
        uint256 expiresAt,
        bytes fingerprint
    );

    /// Emitted by the bid contract when the asset owner accepts a bid.
    event BidAccepted(
        bytes32 id,
        address indexed tokenAddress,
        uint256 indexed tokenId,
        address bidder,
        address indexed seller,
        uint256 price,
        uint256 fee
    );
}

impl EventKind {
    /// Event signature hash (`topics[0]`) used to filter logs.
    pub fn topic0(self) -> B256 {
        match self {
            Self::OrderFilled => OrderSuccessful::SIGNATURE_HASH,
            Self::BidCreated => BidCreated::SIGNATURE_HASH,
            Self::BidAccepted => BidAccepted::SIGNATURE_HASH,
        }
    }

    /// Solidity event signature.
    pub fn signature(self) -> &'static str {
        match self {
            Self::OrderFilled => OrderSuccessful::SIGNATURE,
            Self::BidCreated => BidCreated::SIGNATURE,
            Self::BidAccepted => BidAccepted::SIGNATURE,
        }
    }
}

/// Kind-specific fields of a decoded marketplace event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    OrderFilled {
        asset_id: U256,
        nft_address: Address,
        total_price: U256,
        buyer: Address,
        seller: Address,
    },
    BidCreated {
        token_address: Address,
        token_id: U256,
        bidder: Address,
        price: U256,
    },
    BidAccepted {
        token_address: Address,
        token_id: U256,
        bidder: Address,
        seller: Address,
        price: U256,
    },
}

impl MarketEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OrderFilled { .. } => EventKind::OrderFilled,
            Self::BidCreated { .. } => EventKind::BidCreated,
            Self::BidAccepted { .. } => EventKind::BidAccepted,
        }
    }

    /// The NFT contract the event refers to.
    pub fn token_contract(&self) -> Address {
        match self {
            Self::OrderFilled { nft_address, .. } => *nft_address,
            Self::BidCreated { token_address, .. } | Self::BidAccepted { token_address, .. } => {
                *token_address
            }
        }
    }

    /// Price in the smallest unit of the payment token.
    pub fn price(&self) -> U256 {
        match self {
            Self::OrderFilled { total_price, .. } => *total_price,
            Self::BidCreated { price, .. } | Self::BidAccepted { price, .. } => *price,
        }
    }
}

/// Decode `raw` as an event of `kind`.
///
/// Fails with [`NotifyError::Decode`] if the signature hash does not match
/// `kind` or the topics/data do not fit the ABI.
pub fn decode_event(kind: EventKind, raw: &RawEvent) -> Result<MarketEvent, NotifyError> {
    match raw.topics.first() {
        Some(topic0) if *topic0 == kind.topic0() => {}
        Some(topic0) => {
            return Err(NotifyError::Decode(format!(
                "log {}:{} has topic0 {topic0}, expected {} ({kind})",
                raw.tx_hash,
                raw.log_index,
                kind.topic0()
            )))
        }
        None => {
            return Err(NotifyError::Decode(format!(
                "log {}:{} has no topics",
                raw.tx_hash, raw.log_index
            )))
        }
    }

    let topics = raw.topics.iter().copied();
    let data = raw.data.as_ref();
    let decode_err =
        |e: alloy_sol_types::Error| NotifyError::Decode(format!("{kind} at block {}: {e}", raw.block_number));

    let event = match kind {
        EventKind::OrderFilled => {
            let ev = OrderSuccessful::decode_raw_log(topics, data, true).map_err(decode_err)?;
            MarketEvent::OrderFilled {
                asset_id: ev.assetId,
                nft_address: ev.nftAddress,
                total_price: ev.totalPrice,
                buyer: ev.buyer,
                seller: ev.seller,
            }
        }
        EventKind::BidCreated => {
            let ev = BidCreated::decode_raw_log(topics, data, true).map_err(decode_err)?;
            MarketEvent::BidCreated {
                token_address: ev.tokenAddress,
                token_id: ev.tokenId,
                bidder: ev.bidder,
                price: ev.price,
            }
        }
        EventKind::BidAccepted => {
            let ev = BidAccepted::decode_raw_log(topics, data, true).map_err(decode_err)?;
            MarketEvent::BidAccepted {
                token_address: ev.tokenAddress,
                token_id: ev.tokenId,
                bidder: ev.bidder,
                seller: ev.seller,
                price: ev.price,
            }
        }
    };
    Ok(event)
}
