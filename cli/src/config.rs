//! YAML configuration file.
//!
//! ```yaml
//! log: { level: info, json: false }
//! database: ./chainnotify.db
//! interval_secs: 900
//! rpc:
//!   ethereum: https://eth.example.org
//!   polygon: https://polygon.example.org
//! sink: { type: log }
//! poller: { max_concurrent_dispatch: 8 }
//! run_mode: sequential
//! channels:
//!   - id: decentraland
//!     feeds:
//!       - { id: eth-orders, chain: ethereum, kind: order_filled, contract: "0x…" }
//! ```
//!
//! `CHAINNOTIFY_RPC_<CHAIN>` (e.g. `CHAINNOTIFY_RPC_POLYGON`) overrides the
//! matching `rpc` entry.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use chainnotify_core::{Chain, NotifierConfig};
use chainnotify_evm::gateway::DEFAULT_MAX_BLOCK_RANGE;

use crate::sink::SinkConfig;
use crate::telemetry::LogConfig;

/// JSON-RPC client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmConfig {
    /// Widest `eth_getLogs` window per request.
    pub max_block_range: u64,
    /// HTTP timeout of a single JSON-RPC request.
    pub request_timeout_ms: u64,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            request_timeout_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    /// SQLite path or URL; `:memory:` for an ephemeral store.
    #[serde(default = "default_database")]
    pub database: String,
    /// Seconds between scheduled cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// JSON-RPC endpoint per chain.
    #[serde(default)]
    pub rpc: BTreeMap<Chain, String>,
    #[serde(default)]
    pub evm: EvmConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(flatten)]
    pub notifier: NotifierConfig,
}

fn default_database() -> String {
    "./chainnotify.db".into()
}

fn default_interval_secs() -> u64 {
    900
}

impl AppConfig {
    /// Read, parse and validate `path`, then apply RPC env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config = Self::from_yaml(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.notifier.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for chain in [Chain::Ethereum, Chain::Polygon] {
            let key = format!("CHAINNOTIFY_RPC_{}", chain.slug().to_uppercase());
            if let Some(url) = lookup(&key) {
                self.rpc.insert(chain, url);
            }
        }
    }

    /// Chains referenced by at least one feed.
    pub fn chains_in_use(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self
            .notifier
            .channels
            .iter()
            .flat_map(|c| c.feeds.iter().map(|f| f.chain))
            .collect();
        chains.sort();
        chains.dedup();
        chains
    }
}
