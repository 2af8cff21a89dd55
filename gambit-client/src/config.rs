//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use gambit_core::MOVE_CLOCK_SECS;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client configuration, loadable from a TOML file. Every field has a
/// default, so an empty file (or no file) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root path all documents live under in the store.
    #[serde(default = "default_store_root")]
    pub store_root: String,

    /// Interval between clock ticks, in milliseconds. One second in
    /// production; tests shrink it to run clock scenarios quickly.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Move-clock ceiling, in ticks.
    #[serde(default = "default_move_clock_secs")]
    pub move_clock_secs: u32,

    /// How long matchmaking waits for an opponent before giving up, in
    /// seconds. Also the queue-entry time to live.
    #[serde(default = "default_matchmaking_wait_secs")]
    pub matchmaking_wait_secs: u64,
}

fn default_store_root() -> String {
    "gambit".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_move_clock_secs() -> u32 {
    MOVE_CLOCK_SECS
}

fn default_matchmaking_wait_secs() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            tick_interval_ms: default_tick_interval_ms(),
            move_clock_secs: default_move_clock_secs(),
            matchmaking_wait_secs: default_matchmaking_wait_secs(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert_eq!(config.store_root, "gambit");
        assert_eq!(config.tick_interval_ms, 1_000);
        assert_eq!(config.move_clock_secs, 35);
        assert_eq!(config.matchmaking_wait_secs, 60);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.move_clock_secs, MOVE_CLOCK_SECS);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: ClientConfig = toml::from_str(
            r#"
            store_root = "test-root"
            tick_interval_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.store_root, "test-root");
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.move_clock_secs, 35);
        assert_eq!(config.matchmaking_wait_secs, 60);
    }
}
