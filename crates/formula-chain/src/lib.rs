//! # formula-chain
//!
//! A per-node, hash-linked ledger of formula search steps, with peer
//! reconciliation over a small line protocol.
//!
//! ## Overview
//!
//! - **Blocks**: one record per search step, sealed with a SHA-256 hash of
//!   their canonical encoding and an optional HMAC tag
//! - **Chain**: an append-only file of blocks, each linked to its
//!   predecessor's hash
//! - **Fingerprint**: the hash of the tunables; blocks from a different
//!   ruleset are foreign
//! - **Sync**: nodes pull missing blocks from peers; anything that does not
//!   extend the local head is quarantined, never merged
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use formula_chain::{Node, NodeConfig, PeerAddr, SyncService};
//! use formula_chain::core::BlockBuilder;
//!
//! async fn example() {
//!     let mut config = NodeConfig::with_data_dir("data");
//!     config.sync.enabled = true;
//!     config.sync.peers.push(PeerAddr::new("10.0.0.2", 7070));
//!
//!     let node = Arc::new(Node::open(config).unwrap());
//!     let step = node.summarize().await.unwrap().next_step();
//!     node.append(BlockBuilder::new(step, node.fingerprint()).formula("x^2").build())
//!         .await
//!         .unwrap();
//!
//!     let service = SyncService::new(node.clone());
//!     service.start().await.unwrap();
//!     let report = service.reconcile_once().await;
//!     println!("appended {} blocks", report.appended());
//!     service.stop().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `formula_chain::core` - Blocks, canonical encoding, hashing
//! - `formula_chain::store` - Ledger storage and quarantine
//! - `formula_chain::sync` - Sync protocol

pub mod config;
pub mod error;
pub mod node;
pub mod service;

// Re-export component crates
pub use formula_chain_core as core;
pub use formula_chain_store as store;
pub use formula_chain_sync as sync;

// Re-export main types for convenience
pub use config::{NodeConfig, PeerAddr, SyncConfig};
pub use error::{NodeError, Result};
pub use node::{random_node_id, Node};
pub use service::{ReconcileReport, SyncService};

// Re-export commonly used core types
pub use formula_chain_core::{
    Block, BlockBuilder, ChainRecord, ChainSummary, HmacKey, Sha256Hash, Tunables,
};
pub use formula_chain_store::{FileLedger, Ledger, MemoryLedger, VerifyReport};
