//! Error types for the store module.

use formula_chain_core::CoreError;
use thiserror::Error;

/// Errors that can occur during ledger and quarantine operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error on the chain file or a quarantine file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chain line that does not decode as a canonical record.
    #[error("malformed record at line {line}: {source}")]
    Malformed {
        /// Zero-based line index, equal to the expected step.
        line: u64,
        #[source]
        source: CoreError,
    },

    /// A blocking file task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Join(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
