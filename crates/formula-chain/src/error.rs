//! Error types for the node.

use formula_chain_store::StoreError;
use formula_chain_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node and service operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// `start` called while the listener is running.
    #[error("sync service already running")]
    AlreadyRunning,

    /// Could not open the listening socket.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
