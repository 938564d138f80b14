//! # formula-chain sync
//!
//! Line-oriented pull protocol between formula-chain nodes.
//!
//! ## Overview
//!
//! A node pulls from a peer by sending its chain summary and the first step
//! it is missing. The peer streams every block from that step and closes.
//! Nothing is pushed, and there is no session state beyond one connection.
//!
//! ## Key Properties
//!
//! - **Idempotent**: a repeated pull asks for the next missing step and
//!   receives nothing new
//! - **Append-only**: received blocks either extend the local head or are
//!   quarantined; the local chain is never rewritten
//! - **Forward compatible**: unknown keywords are ignored
//!
//! ## Usage
//!
//! ```rust,no_run
//! use formula_chain_core::Tunables;
//! use formula_chain_store::{FileLedger, Quarantine};
//! use formula_chain_sync::{pull_from_peer, ProtocolConfig};
//!
//! async fn example() {
//!     let ledger = FileLedger::open("data/chain.jsonl", None).unwrap();
//!     let quarantine = Quarantine::new("data/quarantine");
//!     let config = ProtocolConfig::new("node-a", Tunables::default().fingerprint());
//!
//!     let report = pull_from_peer("10.0.0.2", 7000, &ledger, &quarantine, &config)
//!         .await
//!         .unwrap();
//!     println!("appended {} blocks", report.appended);
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Puller                               Server
//!   |-- SYNC/1 NODE FP HEIGHT HASH ----->|
//!   |-- REQUEST <n> TRUST <r> END ------>|
//!   |<----- SYNC/1 STATUS NODE FP -------|
//!   |<----- HEIGHT HASH -----------------|
//!   |<----- BLOCK <n> <len> + frame -----|
//!   |<----- ... -------------------------|
//!   |<----- END -------------------------|
//! ```

pub mod client;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{pull_from_peer, pull_over, PullReport};
pub use error::{Result, SyncError};
pub use messages::{limits, Line, PeerStatus, PROTOCOL_VERSION};
pub use protocol::{PeerSummary, ProtocolConfig};
pub use server::{serve_connection, ServeReport};
pub use transport::{connect, LineReader, LineWriter};
