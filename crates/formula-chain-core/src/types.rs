//! Shared value types.

use crate::crypto::Sha256Hash;

/// Snapshot of a local chain, used to build protocol handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSummary {
    /// This node's config fingerprint.
    pub fingerprint: Sha256Hash,
    /// Number of blocks in the chain.
    pub height: u64,
    /// Hash of the last block; `None` for an empty chain.
    pub head_hash: Option<Sha256Hash>,
}

impl ChainSummary {
    /// Summary of an empty chain.
    pub fn empty(fingerprint: Sha256Hash) -> Self {
        Self {
            fingerprint,
            height: 0,
            head_hash: None,
        }
    }

    /// First step not yet present locally.
    pub fn next_step(&self) -> u64 {
        self.height
    }
}
