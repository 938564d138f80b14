//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;

use tempfile::TempDir;

use formula_chain_core::{Block, BlockBuilder, ChainRecord, HmacKey, Sha256Hash};
use formula_chain_store::{FileLedger, Ledger, Quarantine, Result};

/// A deterministic producer block for `step`, tagged so that chains built
/// with different tags diverge from the genesis block on.
pub fn step_block(step: u64, fingerprint: Sha256Hash, tag: &str) -> Block {
    BlockBuilder::new(step, fingerprint)
        .seed(step)
        .run_id(format!("{}-run", tag))
        .formula(format!("{}*x^{}", tag, step))
        .eff(1.0 / (step as f64 + 1.0))
        .compl(step as f64)
        .breakdown("accuracy", 0.5)
        .build()
}

/// Seal `n` linked records in memory without touching a ledger.
pub fn sealed_chain(
    n: u64,
    fingerprint: Sha256Hash,
    tag: &str,
    key: Option<&HmacKey>,
) -> Vec<ChainRecord> {
    let mut out: Vec<ChainRecord> = Vec::with_capacity(n as usize);
    for step in 0..n {
        let prev = out.last().map(|r| r.hash);
        out.push(ChainRecord::seal(step_block(step, fingerprint, tag), prev, key));
    }
    out
}

/// Append blocks until the ledger holds `height` blocks.
pub async fn fill_to<L: Ledger + ?Sized>(
    ledger: &L,
    height: u64,
    fingerprint: Sha256Hash,
    tag: &str,
) -> Result<Vec<ChainRecord>> {
    let start = ledger.summarize(fingerprint).await?.height;
    let mut appended = Vec::new();
    for step in start..height {
        appended.push(ledger.append(step_block(step, fingerprint, tag)).await?);
    }
    Ok(appended)
}

/// A file ledger and quarantine in a temporary directory.
pub struct TempLedger {
    pub dir: TempDir,
    pub ledger: FileLedger,
    pub quarantine: Quarantine,
}

impl TempLedger {
    /// Create a fresh, empty ledger.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a fresh ledger that seals with `key`.
    pub fn with_key(key: HmacKey) -> Self {
        Self::build(Some(key))
    }

    fn build(key: Option<HmacKey>) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let ledger = FileLedger::open(dir.path().join("chain.jsonl"), key).expect("open ledger");
        let quarantine = Quarantine::new(dir.path().join("quarantine"));
        Self {
            dir,
            ledger,
            quarantine,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempLedger {
    fn default() -> Self {
        Self::new()
    }
}
