//! Validator configuration loaded from TOML.
//!
//! ```toml
//! [node]
//! validator_id = 0
//! public_key = "<64 hex chars>"
//!
//! [network]
//! listen_addr = "0.0.0.0:9000"
//! peers = [
//!     { validator_id = 1, addr = "10.0.0.2:9000", public_key = "<64 hex chars>" },
//! ]
//!
//! [sync]
//! bft_sync_patience_ms = 200
//! ledger_sync_batch_size = 100
//!
//! [telemetry]
//! log_filter = "info,quorum=debug"
//!
//! [storage]
//! data_dir = "./data"
//! ```

use quorum_sync::SyncConfig;
use quorum_types::{HexError, PublicKey, ValidatorId, ValidatorSet};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Validator {0} is listed as its own peer")]
    SelfPeer(ValidatorId),

    #[error("Invalid public key for {validator}: {source}")]
    PublicKey {
        validator: ValidatorId,
        source: HexError,
    },
}

/// Top-level validator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,

    #[serde(default)]
    pub storage: StorageSection,
}

impl NodeConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        let local = config.validator_id();
        if config.network.peers.iter().any(|p| p.validator_id == local.0) {
            return Err(ConfigError::SelfPeer(local));
        }
        config.validator_set()?;
        Ok(config)
    }

    pub fn validator_id(&self) -> ValidatorId {
        ValidatorId(self.node.validator_id)
    }

    /// Validators whose signatures this node accepts: itself and every peer
    /// with a configured public key.
    pub fn validator_set(&self) -> Result<ValidatorSet, ConfigError> {
        let local = (self.validator_id(), self.node.public_key.as_deref());
        let peers = self
            .network
            .peers
            .iter()
            .map(|p| (ValidatorId(p.validator_id), p.public_key.as_deref()));

        let mut validators = Vec::new();
        for (validator, key) in std::iter::once(local).chain(peers) {
            let Some(key) = key else {
                continue;
            };
            let key = PublicKey::from_hex(key)
                .map_err(|source| ConfigError::PublicKey { validator, source })?;
            validators.push((validator, key));
        }
        Ok(ValidatorSet::new(validators))
    }

    /// Peers to dial, excluding this validator.
    pub fn peers(&self) -> impl Iterator<Item = (ValidatorId, SocketAddr)> + '_ {
        self.network
            .peers
            .iter()
            .map(|p| (ValidatorId(p.validator_id), p.addr))
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// Validator ID (index in the committee)
    pub validator_id: u64,

    /// Hex-encoded ed25519 key this validator signs votes with.
    #[serde(default)]
    pub public_key: Option<String>,

    /// Seed for the node's random peer choices. Derived from the validator
    /// id when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// Frames queued per peer before sends are dropped.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            peers: Vec::new(),
            send_queue: default_send_queue(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9000))
}

fn default_send_queue() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    pub validator_id: u64,
    pub addr: SocketAddr,

    /// Hex-encoded ed25519 key. A peer without one is not trusted to sign
    /// certificates.
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Sync tuning. Absent fields keep [`SyncConfig`]'s defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncSection {
    pub bft_sync_patience_ms: Option<u64>,
    pub max_backoff_multiplier: Option<u32>,
    pub request_rate_per_sec: Option<f64>,
    pub request_burst: Option<u32>,
    pub ledger_sync_batch_size: Option<u32>,
    pub ledger_sync_patience_ms: Option<u64>,
    pub max_ledger_sync_batch_size: Option<u32>,
}

impl SyncSection {
    pub fn to_sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::default();
        if let Some(ms) = self.bft_sync_patience_ms {
            config = config.with_bft_sync_patience(Duration::from_millis(ms));
        }
        if let Some(multiplier) = self.max_backoff_multiplier {
            config = config.with_max_backoff_multiplier(multiplier);
        }
        let rate = self.request_rate_per_sec.unwrap_or(config.request_rate_per_sec);
        let burst = self.request_burst.unwrap_or(config.request_burst);
        config = config.with_request_rate(rate, burst);
        if let Some(batch) = self.ledger_sync_batch_size {
            config = config.with_ledger_sync_batch_size(batch);
        }
        if let Some(ms) = self.ledger_sync_patience_ms {
            config = config.with_ledger_sync_patience(Duration::from_millis(ms));
        }
        if let Some(max) = self.max_ledger_sync_batch_size {
            config.max_ledger_sync_batch_size = max;
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySection {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub ansi: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            ansi: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
