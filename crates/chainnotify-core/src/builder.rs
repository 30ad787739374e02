//! Fluent builder API for channels.
//!
//! # Example
//!
//! ```rust
//! use alloy_primitives::address;
//! use chainnotify_core::{Chain, ChannelBuilder, EventKind};
//!
//! let channel = ChannelBuilder::new("decentraland-polygon")
//!     .name("Decentraland (Polygon)")
//!     .feed(
//!         "polygon-bids-created",
//!         Chain::Polygon,
//!         EventKind::BidCreated,
//!         address!("b96697fa4a3361ba35b774a42c58daccaad1b8e1"),
//!     )
//!     .build();
//! assert_eq!(channel.feeds.len(), 1);
//! ```

use alloy_primitives::Address;

use crate::orchestrator::Channel;
use crate::types::{Chain, EventKind, Feed};

/// Fluent builder for [`Channel`].
pub struct ChannelBuilder {
    channel: Channel,
}

impl ChannelBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            channel: Channel {
                name: id.clone(),
                id,
                feeds: vec![],
            },
        }
    }

    /// Set the human-readable channel name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.channel.name = name.into();
        self
    }

    /// Add a feed priced with the default decimals.
    pub fn feed(
        mut self,
        id: impl Into<String>,
        chain: Chain,
        kind: EventKind,
        contract: Address,
    ) -> Self {
        self.channel.feeds.push(Feed::new(id, chain, kind, contract));
        self
    }

    /// Add a fully specified feed.
    pub fn with_feed(mut self, feed: Feed) -> Self {
        self.channel.feeds.push(feed);
        self
    }

    pub fn build(self) -> Channel {
        self.channel
    }
}
