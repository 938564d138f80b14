//! # formula-chain store
//!
//! Storage for formula-chain ledgers. Provides a trait-based interface over
//! one append-only chain with a flat-file and an in-memory implementation,
//! plus the quarantine side files used by sync.
//!
//! ## Key Types
//!
//! - [`Ledger`] - The async trait for chain persistence
//! - [`FileLedger`] - Newline-delimited chain file
//! - [`MemoryLedger`] - In-memory ledger for tests
//! - [`VerifyReport`] - Result of replaying the whole chain
//! - [`Quarantine`] - Foreign/conflict side files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use formula_chain_store::{FileLedger, Ledger};
//! use formula_chain_core::{BlockBuilder, Tunables};
//!
//! async fn example() {
//!     let fp = Tunables::default().fingerprint();
//!     let ledger = FileLedger::open("data/chain.jsonl", None).unwrap();
//!
//!     ledger.append(BlockBuilder::new(0, fp).formula("x^2").build()).await.unwrap();
//!     assert!(ledger.verify().await.unwrap().is_valid());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No index**: every read re-parses the chain
//! - **No locking**: callers serialize mutation
//! - **Verify is read-only**: it reports the first failure and never repairs

pub mod error;
pub mod file;
pub mod memory;
pub mod quarantine;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use quarantine::{sanitize_peer_id, Quarantine, QuarantineReason};
pub use traits::{verify_lines, Ledger, VerifyFailure, VerifyReport};
