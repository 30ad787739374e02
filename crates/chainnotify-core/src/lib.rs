//! chainnotify-core — incremental feed polling and event-to-notification pipeline.
//!
//! # Architecture
//!
//! ```text
//! ChannelOrchestrator → FeedPoller (per feed)
//!                          ├── CursorStore        (last processed block per feed)
//!                          ├── LedgerGateway      (chain height + log queries)
//!                          ├── EventProcessor     (decode → enrich → render)
//!                          │     └── MetadataResolver (name / owner / decimals)
//!                          └── NotificationSink   (delivery)
//! ```
//!
//! Every external collaborator is a trait; concrete JSON-RPC and SQLite
//! implementations live in `chainnotify-evm` and `chainnotify-storage`.

pub mod abi;
pub mod builder;
pub mod config;
pub mod cursor;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod poller;
pub mod processor;
pub mod sink;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::ChannelBuilder;
pub use config::{NotifierConfig, PollerConfig, RunMode};
pub use cursor::{Cursor, CursorStore, MemoryCursorStore};
pub use error::{NotifyError, PollError};
pub use gateway::{LedgerGateway, MetadataResolver};
pub use orchestrator::{Channel, ChannelOrchestrator, CycleOptions, CycleReport, FeedOutcome, FeedReport};
pub use poller::{FeedPoller, PollContext, PollResult};
pub use processor::EventProcessor;
pub use sink::{LogSink, MemorySink, NotificationSink, SubmitOutcome};
pub use types::{BlockRange, Chain, EventKind, Feed, NotificationPayload, RawEvent};
