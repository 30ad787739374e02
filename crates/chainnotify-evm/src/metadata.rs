//! [`MetadataResolver`] over `eth_call`.
//!
//! Token names and decimals never change, so they are cached per
//! `(chain, token)`. Owners are looked up on every call.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use chainnotify_core::{Chain, MetadataResolver, NotifyError};

use crate::rpc::{RpcClient, RpcTransport};

sol! {
    function name() external view returns (string);
    function ownerOf(uint256 tokenId) external view returns (address);
    function decimals() external view returns (uint8);
}

type TokenKey = (Chain, Address);

/// Resolves token metadata with read-only contract calls.
#[derive(Default)]
pub struct EvmMetadataResolver {
    clients: HashMap<Chain, RpcClient>,
    names: Mutex<HashMap<TokenKey, String>>,
    decimals: Mutex<HashMap<TokenKey, u8>>,
}

impl EvmMetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `chain` to `transport`.
    pub fn with_chain(mut self, chain: Chain, transport: Arc<dyn RpcTransport>) -> Self {
        self.clients.insert(chain, RpcClient::new(transport));
        self
    }

    async fn call<C: SolCall>(
        &self,
        chain: Chain,
        token: Address,
        call: C,
    ) -> Result<C::Return, NotifyError> {
        let client = self.clients.get(&chain).ok_or_else(|| NotifyError::Metadata {
            token: token.to_string(),
            reason: format!("no RPC endpoint for {chain}"),
        })?;
        let tx = json!({ "to": token, "data": Bytes::from(call.abi_encode()) });
        let output: Bytes = client
            .call("eth_call", vec![tx, json!("latest")])
            .await
            .map_err(|e| NotifyError::Metadata {
                token: token.to_string(),
                reason: format!("{}: {e}", C::SIGNATURE),
            })?;
        C::abi_decode_returns(&output, true).map_err(|e| NotifyError::Metadata {
            token: token.to_string(),
            reason: format!("{} returned undecodable data: {e}", C::SIGNATURE),
        })
    }
}

fn cached<K: Eq + Hash, V: Clone>(cache: &Mutex<HashMap<K, V>>, key: &K) -> Option<V> {
    cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn remember<K: Eq + Hash, V>(cache: &Mutex<HashMap<K, V>>, key: K, value: V) {
    cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, value);
}

#[async_trait]
impl MetadataResolver for EvmMetadataResolver {
    async fn asset_name(&self, chain: Chain, token: Address) -> Result<String, NotifyError> {
        if let Some(name) = cached(&self.names, &(chain, token)) {
            return Ok(name);
        }
        let name = self.call(chain, token, nameCall {}).await?._0;
        remember(&self.names, (chain, token), name.clone());
        Ok(name)
    }

    async fn asset_owner(
        &self,
        chain: Chain,
        token: Address,
        token_id: U256,
    ) -> Result<Address, NotifyError> {
        Ok(self
            .call(chain, token, ownerOfCall { tokenId: token_id })
            .await?
            ._0)
    }

    async fn decimals(&self, chain: Chain, token: Address) -> Result<u8, NotifyError> {
        if let Some(decimals) = cached(&self.decimals, &(chain, token)) {
            return Ok(decimals);
        }
        let decimals = self.call(chain, token, decimalsCall {}).await?._0;
        remember(&self.decimals, (chain, token), decimals);
        Ok(decimals)
    }
}
