//! Logging setup for the `chainnotify` binary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The `log:` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target not listed in `components`.
    pub level: String,
    /// Per-crate levels, e.g. `chainnotify_evm: debug` to see every RPC call.
    pub components: BTreeMap<String, String>,
    /// One JSON object per line, for log shippers.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            components: BTreeMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directives, e.g. `"info,chainnotify_evm=debug"`.
    /// Crate names may be written with dashes.
    pub fn directives(&self) -> String {
        self.components
            .iter()
            .fold(self.level.clone(), |mut acc, (component, level)| {
                acc.push_str(&format!(",{}={level}", component.replace('-', "_")));
                acc
            })
    }
}

/// Install the global subscriber. Logs go to stderr so `cycle` output on
/// stdout stays machine-readable. `RUST_LOG` replaces the configured levels.
pub fn init_tracing(config: &LogConfig) {
    let (filter, invalid) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, None),
        Err(_) => match EnvFilter::try_new(config.directives()) {
            Ok(filter) => (filter, None),
            Err(e) => (EnvFilter::new("info"), Some(e.to_string())),
        },
    };

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if let Some(error) = invalid {
        tracing::warn!(%error, directives = %config.directives(), "Invalid log levels in config, using info");
    }
}
