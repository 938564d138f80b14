//! # formula-chain core
//!
//! Pure primitives for formula-chain: blocks, canonical encoding, hashing and
//! per-block integrity checks.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Block`] - The payload of one ledger record
//! - [`ChainRecord`] - A sealed block with its `hash` and optional `hmac`
//! - [`Tunables`] - The parameter set whose hash is the config fingerprint
//! - [`ChainCursor`] - Running replay state used by verify and sync
//!
//! ## Canonicalization
//!
//! Hashes are computed over a frozen JSON encoding. See [`canonical`].

pub mod block;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod tunables;
pub mod types;
pub mod validation;

pub use block::{parent_of, Block, BlockBuilder, ChainRecord, GENESIS_PARENT, VOTE_COUNT};
pub use canonical::{canonical_payload, canonical_tunables, decode_record, encode_record};
pub use crypto::{HmacKey, HmacTag, Sha256Hash, HMAC_ALG};
pub use error::{CoreError, IntegrityError};
pub use tunables::Tunables;
pub use types::ChainSummary;
pub use validation::{check_record, ChainCursor};
