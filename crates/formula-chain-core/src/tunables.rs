//! The tunable parameter set that governs block production.
//!
//! Its canonical encoding hashes to the config fingerprint, the ruleset
//! identity carried by every block. Chains sharing a fingerprint are
//! comparable; anything else is foreign.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_tunables;
use crate::crypto::Sha256Hash;

/// Parameters of the external search/voting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub decay: f64,
    pub quorum: f64,
    pub temperature: f64,
    pub threshold: f64,
    pub max_complexity: u32,
    pub seed: u64,
    /// Step budget.
    pub steps: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            decay: 0.9,
            quorum: 0.6,
            temperature: 1.0,
            threshold: 0.5,
            max_complexity: 32,
            seed: 42,
            steps: 1000,
        }
    }
}

impl Tunables {
    /// SHA-256 of the canonical encoding.
    pub fn fingerprint(&self) -> Sha256Hash {
        Sha256Hash::hash(canonical_tunables(self).as_bytes())
    }
}
