//! Error types for the sync module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during a sync connection.
///
/// Every variant aborts the current connection only. Blocks merged before
/// the error stay merged; nothing from the offending frame is.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Socket-level failure (connect, read, write, early close).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The peer violated the line grammar or a limit.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No progress within the configured I/O timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Local ledger or quarantine operation failed.
    #[error("store error: {0}")]
    Store(#[from] formula_chain_store::StoreError),

    /// A frame that is not a canonical record.
    #[error("undecodable frame for step {step}: {source}")]
    Frame {
        step: u64,
        #[source]
        source: formula_chain_core::CoreError,
    },
}

impl SyncError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        SyncError::Protocol(msg.into())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
