//! Node configuration.
//!
//! These structs are deserialized by whatever loader embeds the node; this
//! crate only reads them.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use formula_chain_core::{HmacKey, Sha256Hash, Tunables};

/// File name of the chain inside `data_dir`.
pub const CHAIN_FILE: &str = "chain.jsonl";
/// Directory of quarantine files inside `data_dir`.
pub const QUARANTINE_DIR: &str = "quarantine";

/// A peer to pull from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// When false, the service neither listens nor reconciles.
    pub enabled: bool,
    /// Port to listen on; 0 picks a free one.
    pub listen_port: u16,
    /// Exact address to bind. When unset the listener binds `[::]` and
    /// falls back to `0.0.0.0`.
    pub listen_host: Option<String>,
    /// Peers pulled from on every reconciliation tick, in order.
    pub peers: Vec<PeerAddr>,
    /// Advertised to peers. Not enforced.
    pub trust_ratio: f64,
    /// Per-read socket timeout; unset blocks indefinitely.
    pub io_timeout_ms: Option<u64>,
    /// Inbound connections served at once.
    pub max_connections: usize,
    pub reconcile_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_port: 7070,
            listen_host: None,
            peers: Vec::new(),
            trust_ratio: 0.5,
            io_timeout_ms: None,
            max_connections: 64,
            reconcile_interval_secs: 30,
        }
    }
}

impl SyncConfig {
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

/// Everything a node needs to open its chain and talk to peers.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Advertised node id. Empty means a random id is generated at startup.
    pub node_id: String,
    /// Holds the chain file and the quarantine directory.
    pub data_dir: PathBuf,
    /// Source of the config fingerprint.
    pub tunables: Tunables,
    /// HMAC secret. Unset or empty disables block tags.
    pub hmac_key: Option<String>,
    pub sync: SyncConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            data_dir: PathBuf::from("data"),
            tunables: Tunables::default(),
            hmac_key: None,
            sync: SyncConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Config rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// SHA-256 of the canonical tunables.
    pub fn fingerprint(&self) -> Sha256Hash {
        self.tunables.fingerprint()
    }

    pub fn chain_path(&self) -> PathBuf {
        self.data_dir.join(CHAIN_FILE)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.data_dir.join(QUARANTINE_DIR)
    }

    pub fn hmac_key(&self) -> Option<HmacKey> {
        self.hmac_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| HmacKey::new(k.as_bytes()))
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("node_id", &self.node_id)
            .field("data_dir", &self.data_dir)
            .field("tunables", &self.tunables)
            .field("hmac_key", &self.hmac_key.as_ref().map(|_| "<redacted>"))
            .field("sync", &self.sync)
            .finish()
    }
}
