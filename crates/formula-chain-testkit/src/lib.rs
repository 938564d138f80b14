//! # formula-chain testkit
//!
//! Testing utilities for formula-chain.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed blocks with their expected canonical payload,
//!   hash and HMAC
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Temporary ledgers and deterministic chains
//!
//! ## Golden Vectors
//!
//! ```rust
//! use formula_chain_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed, detail) in verify_all_vectors() {
//!     assert!(passed, "{}: {}", name, detail);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use formula_chain_testkit::generators::{block_from_params, BlockParams};
//!
//! proptest! {
//!     #[test]
//!     fn hash_is_deterministic(params: BlockParams) {
//!         let b1 = block_from_params(&params);
//!         let b2 = block_from_params(&params);
//!         prop_assert_eq!(b1.compute_hash(), b2.compute_hash());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use formula_chain_testkit::fixtures::sealed_chain;
//! use formula_chain_core::Tunables;
//!
//! let chain = sealed_chain(3, Tunables::default().fingerprint(), "demo", None);
//! assert_eq!(chain[1].block.prev, Some(chain[0].hash));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fill_to, sealed_chain, step_block, TempLedger};
pub use generators::{block_from_params, BlockParams};
pub use vectors::{all_vectors, golden_block, sealed_vectors, verify_all_vectors, GoldenVector};

/// Install a test-writer tracing subscriber once.
///
/// Honors `RUST_LOG`; defaults to `debug` for this workspace's crates.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "formula_chain=debug,formula_chain_store=debug,formula_chain_sync=debug".into()
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
