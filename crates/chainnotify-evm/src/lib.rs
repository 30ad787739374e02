//! chainnotify-evm — EVM JSON-RPC adapters for the notification pipeline.
//!
//! - [`rpc`]: JSON-RPC 2.0 wire types, the [`RpcTransport`] trait and the
//!   `reqwest` HTTP transport
//! - [`gateway`]: [`EvmGateway`], block height and chunked `eth_getLogs`
//! - [`metadata`]: [`EvmMetadataResolver`], `eth_call` of `name()`,
//!   `ownerOf(uint256)` and `decimals()`

pub mod gateway;
pub mod metadata;
pub mod rpc;

pub use gateway::EvmGateway;
pub use metadata::EvmMetadataResolver;
pub use rpc::{HttpTransport, RpcClient, RpcTransport, TransportError};
