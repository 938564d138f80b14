//! Block: one immutable, hash-linked ledger record.
//!
//! A block is built once by the producer, sealed exactly once when it is
//! appended (which fills in `prev`, `hmac_alg`, `hash` and `hmac`), and is
//! never edited afterwards.

use std::collections::BTreeMap;

use crate::canonical::canonical_payload;
use crate::crypto::{HmacKey, HmacTag, Sha256Hash, HMAC_ALG};

/// Number of entries in a block's vote vector.
pub const VOTE_COUNT: usize = 10;

/// `parent` value carried by the genesis block.
pub const GENESIS_PARENT: i64 = -1;

/// The payload fields of a block: everything that is hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Position in the chain, starting at 0.
    pub step: u64,
    /// `step - 1`, or [`GENESIS_PARENT`] for step 0.
    pub parent: i64,
    pub seed: u64,
    pub run_id: String,
    pub fractal_addr: String,
    /// Opaque formula text from the search engine.
    pub formula: String,
    pub votes: [f64; VOTE_COUNT],
    pub eff: f64,
    pub compl: f64,
    /// Named efficiency components. Encoded with keys in byte order.
    pub eff_breakdown: BTreeMap<String, f64>,
    pub explain: String,
    pub salt: String,
    /// Hash of the preceding block's payload; `None` only for genesis.
    pub prev: Option<Sha256Hash>,
    /// Fingerprint of the ruleset that produced this block.
    pub config_fingerprint: Sha256Hash,
    /// [`HMAC_ALG`] when the record carries a tag, empty otherwise.
    pub hmac_alg: String,
}

impl Block {
    /// The canonical payload bytes (hash and HMAC input).
    pub fn payload_bytes(&self) -> Vec<u8> {
        canonical_payload(self).into_bytes()
    }

    /// Hash of the canonical payload.
    pub fn compute_hash(&self) -> Sha256Hash {
        Sha256Hash::hash(&self.payload_bytes())
    }

    /// Whether this is the first block of a chain.
    pub fn is_genesis(&self) -> bool {
        self.step == 0
    }
}

/// Parent value for a given step.
pub fn parent_of(step: u64) -> i64 {
    if step == 0 {
        GENESIS_PARENT
    } else {
        (step - 1) as i64
    }
}

/// A block together with its derived crypto fields: one chain-file line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRecord {
    pub block: Block,
    /// SHA-256 of the canonical payload.
    pub hash: Sha256Hash,
    /// HMAC-SHA256 of the canonical payload, when a key was configured.
    pub hmac: Option<HmacTag>,
}

impl ChainRecord {
    /// Seal a block onto a chain head.
    ///
    /// Sets `prev` and `hmac_alg`, then computes `hash` and `hmac` over the
    /// resulting canonical payload.
    pub fn seal(mut block: Block, prev: Option<Sha256Hash>, key: Option<&HmacKey>) -> Self {
        block.prev = prev;
        block.hmac_alg = if key.is_some() {
            HMAC_ALG.to_string()
        } else {
            String::new()
        };

        let payload = block.payload_bytes();
        let hash = Sha256Hash::hash(&payload);
        let hmac = key.map(|k| k.sign(&payload));

        Self { block, hash, hmac }
    }

    /// Step of the wrapped block.
    pub fn step(&self) -> u64 {
        self.block.step
    }
}

/// Builder for producer-side blocks.
///
/// `prev` and `hmac_alg` are left empty; they are filled in when the block
/// is appended.
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    /// Start a block at `step` produced under `config_fingerprint`.
    pub fn new(step: u64, config_fingerprint: Sha256Hash) -> Self {
        Self {
            block: Block {
                step,
                parent: parent_of(step),
                seed: 0,
                run_id: String::new(),
                fractal_addr: String::new(),
                formula: String::new(),
                votes: [0.0; VOTE_COUNT],
                eff: 0.0,
                compl: 0.0,
                eff_breakdown: BTreeMap::new(),
                explain: String::new(),
                salt: String::new(),
                prev: None,
                config_fingerprint,
                hmac_alg: String::new(),
            },
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.block.seed = seed;
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.block.run_id = run_id.into();
        self
    }

    pub fn fractal_addr(mut self, addr: impl Into<String>) -> Self {
        self.block.fractal_addr = addr.into();
        self
    }

    pub fn formula(mut self, formula: impl Into<String>) -> Self {
        self.block.formula = formula.into();
        self
    }

    pub fn votes(mut self, votes: [f64; VOTE_COUNT]) -> Self {
        self.block.votes = votes;
        self
    }

    pub fn eff(mut self, eff: f64) -> Self {
        self.block.eff = eff;
        self
    }

    pub fn compl(mut self, compl: f64) -> Self {
        self.block.compl = compl;
        self
    }

    /// Add one named efficiency component.
    pub fn breakdown(mut self, name: impl Into<String>, value: f64) -> Self {
        self.block.eff_breakdown.insert(name.into(), value);
        self
    }

    pub fn explain(mut self, text: impl Into<String>) -> Self {
        self.block.explain = text.into();
        self
    }

    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.block.salt = salt.into();
        self
    }

    /// Finish the block.
    pub fn build(self) -> Block {
        self.block
    }
}
