//! The Node: one local chain plus everything needed to sync it.
//!
//! The node owns the ledger, the quarantine and the single mutator lock.
//! Every chain mutation, producer appends and pulls alike, runs under that
//! lock; reads do not take it.

use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::info;

use formula_chain_core::{Block, ChainRecord, ChainSummary, Sha256Hash};
use formula_chain_store::{FileLedger, Ledger, Quarantine, VerifyReport};
use formula_chain_sync::{
    pull_from_peer, serve_connection, ProtocolConfig, PullReport, ServeReport,
};

use crate::config::{NodeConfig, PeerAddr};
use crate::error::Result;

/// Random 16-hex-digit node id.
pub fn random_node_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// A formula-chain node.
pub struct Node<L: Ledger> {
    node_id: String,
    fingerprint: Sha256Hash,
    config: NodeConfig,
    ledger: L,
    quarantine: Quarantine,
    /// Serializes chain mutation.
    mutator: Mutex<()>,
}

impl Node<FileLedger> {
    /// Open the node's chain file under `config.data_dir`.
    pub fn open(config: NodeConfig) -> Result<Self> {
        let ledger = FileLedger::open(config.chain_path(), config.hmac_key())?;
        Ok(Self::with_ledger(config, ledger))
    }
}

impl<L: Ledger> Node<L> {
    /// Build a node over an existing ledger.
    ///
    /// The ledger should have been opened with `config.hmac_key()`.
    pub fn with_ledger(config: NodeConfig, ledger: L) -> Self {
        let node_id = if config.node_id.is_empty() {
            random_node_id()
        } else {
            config.node_id.clone()
        };
        let fingerprint = config.fingerprint();
        let quarantine = Quarantine::new(config.quarantine_dir());

        info!(node_id = %node_id, fingerprint = %fingerprint, "node ready");

        Self {
            node_id,
            fingerprint,
            config,
            ledger,
            quarantine,
            mutator: Mutex::new(()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn fingerprint(&self) -> Sha256Hash {
        self.fingerprint
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn quarantine(&self) -> &Quarantine {
        &self.quarantine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Producer API
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a block onto the local head and persist it.
    pub async fn append(&self, block: Block) -> Result<ChainRecord> {
        let _guard = self.mutator.lock().await;
        Ok(self.ledger.append(block).await?)
    }

    /// Height and head of the local chain.
    pub async fn summarize(&self) -> Result<ChainSummary> {
        Ok(self.ledger.summarize(self.fingerprint).await?)
    }

    /// Replay the whole chain.
    pub async fn verify(&self) -> Result<VerifyReport> {
        Ok(self.ledger.verify().await?)
    }

    pub async fn records_from(&self, step: u64) -> Result<Vec<ChainRecord>> {
        Ok(self.ledger.records_from(step).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Identity and knobs used for every sync connection.
    pub fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig::new(self.node_id.clone(), self.fingerprint)
            .with_trust_ratio(self.config.sync.trust_ratio)
            .with_io_timeout(self.config.sync.io_timeout())
    }

    /// Pull missing blocks from one peer.
    ///
    /// Holds the mutator lock for the whole exchange, so producer appends
    /// wait until the pull has finished.
    pub async fn pull(&self, peer: &PeerAddr) -> Result<PullReport> {
        let _guard = self.mutator.lock().await;
        let report = pull_from_peer(
            &peer.host,
            peer.port,
            &self.ledger,
            &self.quarantine,
            &self.protocol_config(),
        )
        .await?;
        Ok(report)
    }

    /// Answer one inbound pull. Read-only.
    pub async fn serve<S>(&self, stream: S) -> Result<ServeReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let report = serve_connection(stream, &self.ledger, &self.protocol_config()).await?;
        Ok(report)
    }
}
