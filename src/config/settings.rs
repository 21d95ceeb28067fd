use crate::core::monetary::{DEFAULT_DIFFICULTY, MINING_REWARD};
use crate::core::DEFAULT_PROGRESS_INTERVAL;
use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:5000";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const BOOTSTRAP_PEERS_KEY: &str = "BOOTSTRAP_PEERS";
const MINING_DIFFICULTY_KEY: &str = "MINING_DIFFICULTY";

/// Node settings: defaults, then an optional TOML file, then the
/// environment. Command-line flags are applied last by the binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the accept loop binds to
    pub listen_addr: String,
    /// Address announced to peers; the bound address when unset
    pub advertised_addr: Option<String>,
    pub bootstrap_peers: Vec<String>,
    /// Required leading run of '0' characters in block hashes
    pub difficulty: String,
    pub mining_reward: f64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub progress_interval: u64,
    pub event_log_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: String::from(DEFAULT_NODE_ADDR),
            advertised_addr: None,
            bootstrap_peers: Vec::new(),
            difficulty: String::from(DEFAULT_DIFFICULTY),
            mining_reward: MINING_REWARD,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 5_000,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            event_log_capacity: 512,
        }
    }
}

impl Config {
    /// Defaults, overlaid by `path` when given, overlaid by the environment.
    ///
    /// Not validated: command-line flags still apply on top, so callers run
    /// `validate` once the final values are in place.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        Ok(config)
    }

    /// Overlay values found through `lookup` (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.listen_addr = addr;
        }
        if let Some(peers) = lookup(BOOTSTRAP_PEERS_KEY) {
            self.bootstrap_peers = peers
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(difficulty) = lookup(MINING_DIFFICULTY_KEY) {
            self.difficulty = difficulty;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(BlockchainError::Config(
                "listen_addr must not be empty".to_string(),
            ));
        }
        if !self.difficulty.chars().all(|c| c == '0') {
            return Err(BlockchainError::Config(format!(
                "difficulty must only contain '0' characters, got {:?}",
                self.difficulty
            )));
        }
        if !self.mining_reward.is_finite() || self.mining_reward <= 0.0 {
            return Err(BlockchainError::Config(format!(
                "mining_reward must be positive, got {}",
                self.mining_reward
            )));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(BlockchainError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
