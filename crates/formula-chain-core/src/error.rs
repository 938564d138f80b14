//! Error types for formula-chain core.

use thiserror::Error;

use crate::crypto::Sha256Hash;

/// Errors raised while encoding or decoding chain records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid hex in field `{field}`: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    /// The record parsed, but re-encoding it does not reproduce the input bytes.
    #[error("record is not in canonical form")]
    NonCanonical,
}

/// A violated chain invariant, found while replaying or accepting a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("hash mismatch: stored {stored:?}, recomputed {computed:?}")]
    HashMismatch {
        stored: Sha256Hash,
        computed: Sha256Hash,
    },

    #[error("prev mismatch: expected {expected:?}, got {got:?}")]
    PrevMismatch {
        expected: Option<Sha256Hash>,
        got: Option<Sha256Hash>,
    },

    #[error("step mismatch: expected {expected}, got {got}")]
    StepMismatch { expected: u64, got: u64 },

    #[error("hmac mismatch")]
    HmacMismatch,

    #[error("hmac missing")]
    HmacMissing,

    #[error("hmac present without hmac_alg")]
    HmacUnexpected,

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<CoreError> for IntegrityError {
    fn from(e: CoreError) -> Self {
        IntegrityError::Malformed(e.to_string())
    }
}

impl IntegrityError {
    /// Short machine-friendly reason label, used in logs and reports.
    pub fn reason(&self) -> &'static str {
        match self {
            IntegrityError::HashMismatch { .. } => "hash_mismatch",
            IntegrityError::PrevMismatch { .. } => "prev_mismatch",
            IntegrityError::StepMismatch { .. } => "step_mismatch",
            IntegrityError::HmacMismatch => "hmac_mismatch",
            IntegrityError::HmacMissing => "hmac_missing",
            IntegrityError::HmacUnexpected => "hmac_unexpected",
            IntegrityError::Malformed(_) => "malformed",
        }
    }
}
