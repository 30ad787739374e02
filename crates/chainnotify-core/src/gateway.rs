//! Chain-read traits consumed by the pipeline.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::error::NotifyError;
use crate::types::{BlockRange, Chain, RawEvent};

/// Read access to chain height and logs.
///
/// Implementations must return an empty list, not an error, when
/// `range.is_empty()`.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current block height of `chain`.
    async fn current_height(&self, chain: Chain) -> Result<u64, NotifyError>;

    /// All logs emitted by `contract` with signature hash `topic0` in the
    /// inclusive `range`.
    async fn query_logs(
        &self,
        chain: Chain,
        contract: Address,
        topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, NotifyError>;
}

/// Token metadata lookups used to enrich notifications.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Display name of the token contract (`name()`).
    async fn asset_name(&self, chain: Chain, token: Address) -> Result<String, NotifyError>;

    /// Current holder of `token_id` (`ownerOf(uint256)`).
    async fn asset_owner(
        &self,
        chain: Chain,
        token: Address,
        token_id: U256,
    ) -> Result<Address, NotifyError>;

    /// Declared decimal count of an ERC-20 (`decimals()`).
    async fn decimals(&self, chain: Chain, token: Address) -> Result<u8, NotifyError>;
}
