//! Per-block integrity checks against a running chain head.
//!
//! The same checks run during full-chain verification and when accepting a
//! block from a peer, so anything accepted from the network also passes a
//! later local `verify`.

use crate::block::ChainRecord;
use crate::crypto::{HmacKey, Sha256Hash};
use crate::error::IntegrityError;

/// Check one record against the expected position.
///
/// Order of checks: hash, hmac, prev, step. The first failure is returned.
pub fn check_record(
    record: &ChainRecord,
    expected_step: u64,
    expected_prev: Option<&Sha256Hash>,
    key: Option<&HmacKey>,
) -> Result<(), IntegrityError> {
    let payload = record.block.payload_bytes();

    // 1. Hash reproduces
    let computed = Sha256Hash::hash(&payload);
    if computed != record.hash {
        return Err(IntegrityError::HashMismatch {
            stored: record.hash,
            computed,
        });
    }

    // 2. hmac present iff hmac_alg declared, and valid under our key
    let declared = !record.block.hmac_alg.is_empty();
    match (declared, &record.hmac) {
        (false, Some(_)) => return Err(IntegrityError::HmacUnexpected),
        (true, None) => return Err(IntegrityError::HmacMissing),
        _ => {}
    }
    if let Some(key) = key {
        match &record.hmac {
            None => return Err(IntegrityError::HmacMissing),
            Some(tag) if !key.verify(&payload, tag) => return Err(IntegrityError::HmacMismatch),
            Some(_) => {}
        }
    }

    // 3. Linkage
    if record.block.prev.as_ref() != expected_prev {
        return Err(IntegrityError::PrevMismatch {
            expected: expected_prev.copied(),
            got: record.block.prev,
        });
    }

    // 4. Position
    if record.block.step != expected_step {
        return Err(IntegrityError::StepMismatch {
            expected: expected_step,
            got: record.block.step,
        });
    }

    Ok(())
}

/// Running replay state: the next expected step and the current head hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainCursor {
    pub next_step: u64,
    pub head: Option<Sha256Hash>,
}

impl ChainCursor {
    /// Cursor positioned at an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor positioned after an existing chain of `height` blocks.
    pub fn at(height: u64, head: Option<Sha256Hash>) -> Self {
        Self {
            next_step: height,
            head,
        }
    }

    /// Check a record against this position without advancing.
    pub fn check(&self, record: &ChainRecord, key: Option<&HmacKey>) -> Result<(), IntegrityError> {
        check_record(record, self.next_step, self.head.as_ref(), key)
    }

    /// Move past an accepted record.
    pub fn advance(&mut self, record: &ChainRecord) {
        self.next_step = record.block.step + 1;
        self.head = Some(record.hash);
    }
}
