//! Event processor: turns one raw log into a [`NotificationPayload`].
//!
//! decode (ABI) → enrich (name, decimals, owner) → render (template table).

use alloy_primitives::Address;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::abi::{decode_event, MarketEvent};
use crate::config::PollerConfig;
use crate::error::NotifyError;
use crate::gateway::MetadataResolver;
use crate::template::{counterparties, render, TemplateVars};
use crate::types::{format_units, Feed, NotificationPayload, RawEvent, NOTIFICATION_CATEGORY};

/// Stateless per-event transformer shared by every feed.
#[derive(Clone)]
pub struct EventProcessor {
    resolver: Arc<dyn MetadataResolver>,
    metadata_timeout: Duration,
    default_decimals: u8,
}

impl EventProcessor {
    pub fn new(resolver: Arc<dyn MetadataResolver>, config: &PollerConfig) -> Self {
        Self {
            resolver,
            metadata_timeout: config.metadata_timeout(),
            default_decimals: config.default_decimals,
        }
    }

    /// Build the payload for `raw`, observed on `feed`.
    ///
    /// Any failure (undecodable log, metadata lookup error or timeout) is
    /// scoped to this event; callers should log it and move on.
    pub async fn process(
        &self,
        raw: &RawEvent,
        feed: &Feed,
        simulate: bool,
    ) -> Result<NotificationPayload, NotifyError> {
        if raw.chain != feed.chain {
            return Err(NotifyError::Decode(format!(
                "log from {} delivered to {} feed '{}'",
                raw.chain, feed.chain, feed.id
            )));
        }

        let event = decode_event(feed.kind, raw)?;
        let chain = feed.chain;
        let token = event.token_contract();

        let asset_name = self
            .bounded("name()", token, self.resolver.asset_name(chain, token))
            .await?;

        let decimals = match feed.payment_token {
            Some(payment_token) => {
                self.bounded(
                    "decimals()",
                    payment_token,
                    self.resolver.decimals(chain, payment_token),
                )
                .await?
            }
            None => self.default_decimals,
        };
        let price = format_units(event.price(), decimals);

        let recipient = match &event {
            // A new bid is addressed to whoever holds the asset right now.
            MarketEvent::BidCreated {
                token_address,
                token_id,
                ..
            } => {
                self.bounded(
                    "ownerOf()",
                    *token_address,
                    self.resolver.asset_owner(chain, *token_address, *token_id),
                )
                .await?
            }
            MarketEvent::BidAccepted { bidder, .. } => *bidder,
            MarketEvent::OrderFilled { seller, .. } => *seller,
        };

        let parties = counterparties(&event);
        let rendered = render(
            event.kind(),
            &TemplateVars {
                chain,
                asset_name: &asset_name,
                price: &price,
                counterparties: &parties,
            },
        );

        tracing::debug!(
            feed = %feed.id,
            block = raw.block_number,
            log_index = raw.log_index,
            %recipient,
            "Event processed"
        );

        Ok(NotificationPayload {
            recipient,
            title: rendered.title,
            short_message: rendered.short_message,
            long_message: rendered.long_message,
            category: NOTIFICATION_CATEGORY,
            is_simulated: simulate,
            image_ref: None,
            feed_id: feed.id.clone(),
            block_number: raw.block_number,
            tx_hash: raw.tx_hash,
        })
    }

    /// Run a resolver call under the metadata deadline, folding every failure
    /// into [`NotifyError::Metadata`].
    async fn bounded<T>(
        &self,
        operation: &str,
        token: Address,
        call: impl Future<Output = Result<T, NotifyError>>,
    ) -> Result<T, NotifyError> {
        match tokio::time::timeout(self.metadata_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(NotifyError::Metadata { token, reason })) => {
                Err(NotifyError::Metadata { token, reason })
            }
            Ok(Err(e)) => Err(NotifyError::Metadata {
                token: token.to_string(),
                reason: format!("{operation}: {e}"),
            }),
            Err(_) => Err(NotifyError::Metadata {
                token: token.to_string(),
                reason: format!(
                    "{operation} timed out after {}ms",
                    self.metadata_timeout.as_millis()
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use crate::types::{Chain, EventKind};
    use alloy_primitives::U256;

    fn processor(resolver: MockResolver) -> EventProcessor {
        EventProcessor::new(Arc::new(resolver), &PollerConfig::default())
    }

    #[tokio::test]
    async fn bid_created_goes_to_current_owner() {
        let owner = Address::repeat_byte(0x77);
        let bidder = Address::repeat_byte(0x44);
        let resolver = MockResolver::new().name(NFT, "LAND").owner(NFT, 9, owner);
        let feed = bid_feed("eth-bids", Chain::Ethereum, EventKind::BidCreated);
        let raw = bid_created_log(Chain::Ethereum, 100, NFT, U256::from(9u64), bidder, ether(2));

        let payload = processor(resolver).process(&raw, &feed, false).await.unwrap();
        assert_eq!(payload.recipient, owner);
        assert_eq!(payload.title, "LAND NFT bid created on Ethereum!");
        assert!(payload.short_message.contains("price: 2.0"));
        assert!(payload.short_message.contains(&bidder.to_string()));
        assert_eq!(payload.category, NOTIFICATION_CATEGORY);
        assert_eq!(payload.block_number, 100);
        assert!(!payload.is_simulated);
    }

    #[tokio::test]
    async fn bid_accepted_goes_to_bidder() {
        let bidder = Address::repeat_byte(0x44);
        let seller = Address::repeat_byte(0x55);
        let resolver = MockResolver::new().name(NFT, "Names");
        let feed = bid_feed("poly-bids", Chain::Polygon, EventKind::BidAccepted);
        let raw = bid_accepted_log(Chain::Polygon, 5, NFT, U256::from(1u64), bidder, seller, ether(1));

        let payload = processor(resolver).process(&raw, &feed, true).await.unwrap();
        assert_eq!(payload.recipient, bidder);
        assert!(payload.is_simulated);
        assert!(payload.title.contains("Polygon"));
    }

    #[tokio::test]
    async fn order_filled_goes_to_seller() {
        let seller = Address::repeat_byte(0x55);
        let buyer = Address::repeat_byte(0x66);
        let resolver = MockResolver::new().name(NFT, "Wearables");
        let feed = order_feed("eth-orders", Chain::Ethereum);
        let raw = order_filled_log(Chain::Ethereum, 7, NFT, seller, buyer, ether(3) / U256::from(2u64));

        let payload = processor(resolver).process(&raw, &feed, false).await.unwrap();
        assert_eq!(payload.recipient, seller);
        assert!(payload.short_message.contains("1.5"));
    }

    #[tokio::test]
    async fn payment_token_decimals_rescale_price() {
        let usdc = Address::repeat_byte(0xcc);
        let resolver = MockResolver::new().name(NFT, "LAND").decimals(usdc, 6);
        let feed = order_feed("eth-orders", Chain::Ethereum).with_payment_token(usdc);
        let raw = order_filled_log(
            Chain::Ethereum,
            7,
            NFT,
            Address::ZERO,
            Address::ZERO,
            U256::from(12_500_000u64),
        );

        let payload = processor(resolver).process(&raw, &feed, false).await.unwrap();
        assert!(payload.short_message.contains("price of 12.5,"));
    }

    #[tokio::test]
    async fn decimals_failure_only_fails_that_event() {
        let mana = Address::repeat_byte(0xaa);
        let broken = Address::repeat_byte(0xbb);
        let resolver = MockResolver::new().name(NFT, "LAND").decimals(mana, 18);
        let processor = processor(resolver);
        let good = order_feed("eth-orders", Chain::Ethereum).with_payment_token(mana);
        let bad = order_feed("eth-orders-v2", Chain::Ethereum).with_payment_token(broken);
        let raw = order_filled_log(Chain::Ethereum, 7, NFT, Address::ZERO, Address::ZERO, ether(4));

        match processor.process(&raw, &bad, false).await {
            Err(NotifyError::Metadata { token, .. }) => assert_eq!(token, broken.to_string()),
            other => panic!("expected metadata error, got {other:?}"),
        }
        let payload = processor.process(&raw, &good, false).await.unwrap();
        assert!(payload.short_message.contains("price of 4.0,"));
    }

    #[tokio::test]
    async fn unknown_asset_name_is_metadata_error() {
        let resolver = MockResolver::new(); // knows no names
        let feed = order_feed("eth-orders", Chain::Ethereum);
        let raw = order_filled_log(Chain::Ethereum, 7, NFT, Address::ZERO, Address::ZERO, ether(1));

        let err = processor(resolver).process(&raw, &feed, false).await.unwrap_err();
        assert!(matches!(err, NotifyError::Metadata { .. }));
    }

    #[tokio::test]
    async fn slow_resolver_times_out() {
        let resolver = MockResolver::new()
            .name(NFT, "LAND")
            .delay(Duration::from_millis(200));
        let config = PollerConfig {
            metadata_timeout_ms: 10,
            ..Default::default()
        };
        let processor = EventProcessor::new(Arc::new(resolver), &config);
        let feed = order_feed("eth-orders", Chain::Ethereum);
        let raw = order_filled_log(Chain::Ethereum, 7, NFT, Address::ZERO, Address::ZERO, ether(1));

        match processor.process(&raw, &feed, false).await {
            Err(NotifyError::Metadata { reason, .. }) => assert!(reason.contains("timed out")),
            other => panic!("expected metadata timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chain_mismatch_is_decode_error() {
        let resolver = MockResolver::new().name(NFT, "LAND");
        let feed = order_feed("poly-orders", Chain::Polygon);
        let raw = order_filled_log(Chain::Ethereum, 7, NFT, Address::ZERO, Address::ZERO, ether(1));
        let err = processor(resolver).process(&raw, &feed, false).await.unwrap_err();
        assert!(matches!(err, NotifyError::Decode(_)));
    }
}
