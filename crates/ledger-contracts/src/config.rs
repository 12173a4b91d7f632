//! Ledger configuration, loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! database_file = "data/portal.jsonl"
//! disable_logging = false
//! system_id = "portal-eu-1"
//! write_attempts = 23
//! write_retry_delay_ms = 10
//!
//! [sync]
//! request_timeout_secs = 5
//! retries = 3
//! retry_delay_ms = 500
//!
//! [[sync.peers]]
//! url = "https://portal-a.example.org/api"
//! api_key = "secret"
//!
//! [server]
//! bind_addr = "127.0.0.1:8080"
//! api_key = "secret"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Top-level configuration for one ledger instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// The primary database file every operation defaults to.
    pub database_file: PathBuf,

    /// Turns writes and replay into no-ops.  Meant for ephemeral instances.
    pub disable_logging: bool,

    /// Identifier of this process instance, stamped into every record.
    /// A random UUID is used when absent.
    pub system_id: Option<String>,

    /// Attempts per append before the write is given up.
    pub write_attempts: u32,

    /// Fixed delay between append attempts.
    pub write_retry_delay_ms: u64,

    pub sync: SyncConfig,

    pub server: ServerConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from("ledger.jsonl"),
            disable_logging: false,
            system_id: None,
            write_attempts: 23,
            write_retry_delay_ms: 10,
            sync: SyncConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `LedgerError::ConfigError` if the TOML is malformed or a value
    /// is out of range.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to parse ledger TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as ledger configuration.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the ledger cannot operate with.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.write_attempts == 0 {
            return Err(LedgerError::ConfigError {
                reason: "write_attempts must be at least 1".to_string(),
            });
        }
        if self.database_file.as_os_str().is_empty() {
            return Err(LedgerError::ConfigError {
                reason: "database_file must not be empty".to_string(),
            });
        }
        if let Some(system_id) = &self.system_id {
            if system_id.trim().is_empty() {
                return Err(LedgerError::ConfigError {
                    reason: "system_id must not be blank".to_string(),
                });
            }
        }
        for (idx, peer) in self.sync.peers.iter().enumerate() {
            if peer.url.trim().is_empty() {
                return Err(LedgerError::ConfigError {
                    reason: format!("sync.peers[{}] has an empty url", idx),
                });
            }
        }
        Ok(())
    }

    /// The configured system id, or a fresh UUID.
    pub fn resolve_system_id(&self) -> String {
        self.system_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

/// One remote instance that serves `changeSets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base URL; `/changeSets` is appended.
    pub url: String,

    /// Sent in the `api_key_header` header.
    #[serde(default)]
    pub api_key: String,
}

/// Remote change-set synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Candidate peers, tried in order.  First success wins.
    pub peers: Vec<PeerConfig>,

    /// Per-peer, per-attempt request timeout.
    pub request_timeout_secs: u64,

    /// Extra rounds over the whole peer list after the first one fails.
    pub retries: u32,

    /// Pause between two rounds over the peer list.
    pub retry_delay_ms: u64,

    /// Header carrying the peer's API key.
    pub api_key_header: String,

    /// Pause between follower polls.
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            request_timeout_secs: 5,
            retries: 3,
            retry_delay_ms: 500,
            api_key_header: "X-API-Key".to_string(),
            interval_secs: 30,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Settings for the `changeSets` HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    /// When set, requests must carry it in the sync `api_key_header`.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            api_key: None,
        }
    }
}
