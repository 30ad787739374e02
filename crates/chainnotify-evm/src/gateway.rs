//! [`LedgerGateway`] over EVM JSON-RPC.
//!
//! Uses `eth_blockNumber` for the head and `eth_getLogs` for log queries,
//! splitting ranges wider than `max_block_range` into consecutive chunks.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use chainnotify_core::{BlockRange, Chain, LedgerGateway, NotifyError, RawEvent};

use crate::rpc::{parse_hex_u64, to_hex, RpcClient, RpcTransport};

/// Widest window requested in a single `eth_getLogs` call.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 2_000;

/// A log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    /// `None` for pending logs.
    pub block_number: Option<String>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl RpcLog {
    /// Convert to a [`RawEvent`]; `None` for pending logs.
    fn into_raw_event(self, chain: Chain) -> Result<Option<RawEvent>, NotifyError> {
        let (Some(block), Some(tx_hash)) = (self.block_number.as_deref(), self.transaction_hash)
        else {
            return Ok(None);
        };
        let log_index = match self.log_index.as_deref() {
            Some(idx) => parse_hex_u64(idx)?,
            None => 0,
        };
        Ok(Some(RawEvent {
            chain,
            contract: self.address,
            block_number: parse_hex_u64(block)?,
            tx_hash,
            log_index,
            topics: self.topics,
            data: self.data,
        }))
    }
}

/// Multi-chain JSON-RPC gateway.
pub struct EvmGateway {
    clients: HashMap<Chain, RpcClient>,
    max_block_range: u64,
}

impl Default for EvmGateway {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_RANGE)
    }
}

impl EvmGateway {
    pub fn new(max_block_range: u64) -> Self {
        Self {
            clients: HashMap::new(),
            max_block_range: max_block_range.max(1),
        }
    }

    /// Route `chain` to `transport`.
    pub fn with_chain(mut self, chain: Chain, transport: Arc<dyn RpcTransport>) -> Self {
        self.clients.insert(chain, RpcClient::new(transport));
        self
    }

    fn client(&self, chain: Chain) -> Result<&RpcClient, NotifyError> {
        self.clients
            .get(&chain)
            .ok_or_else(|| NotifyError::GatewayUnavailable(format!("no RPC endpoint for {chain}")))
    }

    async fn logs_chunk(
        &self,
        client: &RpcClient,
        chain: Chain,
        contract: Address,
        topic0: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, NotifyError> {
        let filter = json!({
            "address": contract,
            "topics": [topic0],
            "fromBlock": to_hex(from),
            "toBlock": to_hex(to),
        });
        let logs: Vec<RpcLog> = client.call("eth_getLogs", vec![filter]).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                continue;
            }
            if let Some(event) = log.into_raw_event(chain)? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl LedgerGateway for EvmGateway {
    async fn current_height(&self, chain: Chain) -> Result<u64, NotifyError> {
        let client = self.client(chain)?;
        let hex: String = client.call("eth_blockNumber", vec![]).await?;
        Ok(parse_hex_u64(&hex)?)
    }

    async fn query_logs(
        &self,
        chain: Chain,
        contract: Address,
        topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, NotifyError> {
        if range.is_empty() {
            return Ok(vec![]);
        }
        let client = self.client(chain)?;

        let mut all = Vec::new();
        let mut start = range.from;
        loop {
            let end = start
                .saturating_add(self.max_block_range - 1)
                .min(range.to);
            let chunk = self
                .logs_chunk(client, chain, contract, topic0, start, end)
                .await?;
            tracing::debug!(
                chain = %chain,
                %contract,
                from = start,
                to = end,
                logs = chunk.len(),
                "Fetched log chunk"
            );
            all.extend(chunk);
            if end >= range.to {
                break;
            }
            start = end + 1;
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockTransport;
    use crate::rpc::JsonRpcError;
    use serde_json::Value;

    const CONTRACT: Address = alloy_primitives::address!("c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0");

    fn log_json(block: u64, removed: bool) -> Value {
        json!({
            "address": CONTRACT,
            "topics": [B256::repeat_byte(0x01)],
            "data": "0x",
            "blockNumber": to_hex(block),
            "blockHash": B256::ZERO,
            "transactionHash": B256::repeat_byte(block as u8),
            "logIndex": "0x2",
            "removed": removed,
        })
    }

    fn gateway(transport: Arc<MockTransport>, max_range: u64) -> EvmGateway {
        EvmGateway::new(max_range).with_chain(Chain::Polygon, transport)
    }

    #[tokio::test]
    async fn block_number_is_parsed() {
        let transport = Arc::new(MockTransport::new(|_, _| Ok(json!("0x3e8"))));
        let gw = gateway(transport, 10);
        assert_eq!(gw.current_height(Chain::Polygon).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn unknown_chain_is_unavailable() {
        let transport = Arc::new(MockTransport::new(|_, _| Ok(json!("0x1"))));
        let gw = gateway(transport, 10);
        let err = gw.current_height(Chain::Ethereum).await.unwrap_err();
        assert!(matches!(err, NotifyError::GatewayUnavailable(_)));
    }

    #[tokio::test]
    async fn wide_range_is_chunked() {
        let transport = Arc::new(MockTransport::new(|_, params| {
            let from = parse_hex_u64(params[0]["fromBlock"].as_str().unwrap()).unwrap();
            Ok(json!([log_json(from, false)]))
        }));
        let gw = gateway(transport.clone(), 10);

        let events = gw
            .query_logs(Chain::Polygon, CONTRACT, B256::repeat_byte(0x01), BlockRange::new(100, 125))
            .await
            .unwrap();

        let windows: Vec<(String, String)> = transport
            .calls("eth_getLogs")
            .iter()
            .map(|r| {
                (
                    r.params[0]["fromBlock"].as_str().unwrap().to_string(),
                    r.params[0]["toBlock"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            windows,
            vec![
                (to_hex(100), to_hex(109)),
                (to_hex(110), to_hex(119)),
                (to_hex(120), to_hex(125)),
            ]
        );
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].log_index, 2);
        assert_eq!(events[0].chain, Chain::Polygon);
    }

    #[tokio::test]
    async fn removed_logs_dropped_and_empty_range_skipped() {
        let transport = Arc::new(MockTransport::new(|_, _| {
            Ok(json!([log_json(5, true), log_json(6, false)]))
        }));
        let gw = gateway(transport.clone(), 100);

        let events = gw
            .query_logs(Chain::Polygon, CONTRACT, B256::ZERO, BlockRange::new(5, 6))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].block_number, 6);

        let none = gw
            .query_logs(Chain::Polygon, CONTRACT, B256::ZERO, BlockRange::new(7, 6))
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(transport.calls("eth_getLogs").len(), 1);
    }

    #[tokio::test]
    async fn node_error_fails_query() {
        let transport = Arc::new(MockTransport::new(|_, _| {
            Err(JsonRpcError {
                code: -32005,
                message: "query returned more than 10000 results".into(),
                data: None,
            })
        }));
        let gw = gateway(transport, 100);
        let err = gw
            .query_logs(Chain::Polygon, CONTRACT, B256::ZERO, BlockRange::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::GatewayUnavailable(_)));
    }
}
