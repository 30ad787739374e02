//! Notification wording, one row per event kind.
//!
//! Every kind renders the same three fields from the same inputs; only the
//! wording differs. The chain display name is what tells the two networks
//! apart in the text.

use crate::abi::MarketEvent;
use crate::types::{Chain, EventKind};

/// Rendered text of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub title: String,
    pub short_message: String,
    pub long_message: String,
}

/// Inputs resolved by the processor before rendering.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub chain: Chain,
    pub asset_name: &'a str,
    /// Price already rescaled to a decimal string.
    pub price: &'a str,
    /// Parties named in the body, see [`counterparties`].
    pub counterparties: &'a str,
}

type TextFn = fn(&TemplateVars<'_>) -> String;

struct Template {
    title: TextFn,
    body: TextFn,
}

static ORDER_FILLED: Template = Template {
    title: |v| format!("{} NFT order successful on {}!", v.asset_name, v.chain.display_name()),
    body: |v| {
        format!(
            "{} NFT order successful at a price of {}, {}",
            v.asset_name, v.price, v.counterparties
        )
    },
};

static BID_CREATED: Template = Template {
    title: |v| format!("{} NFT bid created on {}!", v.asset_name, v.chain.display_name()),
    body: |v| {
        format!(
            "{} NFT bid created with the price: {} having {}",
            v.asset_name, v.price, v.counterparties
        )
    },
};

static BID_ACCEPTED: Template = Template {
    title: |v| format!("{} NFT bid accepted on {}", v.asset_name, v.chain.display_name()),
    body: |v| {
        format!(
            "{} NFT bid accepted with the price: {} having {}",
            v.asset_name, v.price, v.counterparties
        )
    },
};

fn template_for(kind: EventKind) -> &'static Template {
    match kind {
        EventKind::OrderFilled => &ORDER_FILLED,
        EventKind::BidCreated => &BID_CREATED,
        EventKind::BidAccepted => &BID_ACCEPTED,
    }
}

/// The parties an event's message names: buyer and seller for orders, the
/// bidder for bids.
pub fn counterparties(event: &MarketEvent) -> String {
    match event {
        MarketEvent::OrderFilled { buyer, seller, .. } => {
            format!("buyer: {buyer}, seller: {seller}")
        }
        MarketEvent::BidCreated { bidder, .. } | MarketEvent::BidAccepted { bidder, .. } => {
            format!("bidder: {bidder}")
        }
    }
}

/// Render the title and messages for an event of `kind`.
pub fn render(kind: EventKind, vars: &TemplateVars<'_>) -> Rendered {
    let template = template_for(kind);
    let short_message = (template.body)(vars);
    let long_message = format!("{short_message} on {}", vars.chain.display_name());
    Rendered {
        title: (template.title)(vars),
        short_message,
        long_message,
    }
}
