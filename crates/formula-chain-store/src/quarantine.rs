//! Side files for blocks rejected during a pull.
//!
//! Rejected frames are kept verbatim, one per line, under
//! `<root>/foreign/<peer>.jsonl` or `<root>/conflicts/<peer>.jsonl`. Nothing
//! here ever touches the local chain.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::file::{append_line_blocking, read_lines_blocking};

/// Why a block was parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuarantineReason {
    /// Produced under a different config fingerprint.
    Foreign,
    /// Same fingerprint, but does not extend the local chain.
    Conflict,
}

impl QuarantineReason {
    /// Directory name under the quarantine root.
    pub fn dir_name(self) -> &'static str {
        match self {
            QuarantineReason::Foreign => "foreign",
            QuarantineReason::Conflict => "conflicts",
        }
    }
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuarantineReason::Foreign => f.write_str("foreign"),
            QuarantineReason::Conflict => f.write_str("conflict"),
        }
    }
}

/// Map a peer id to a safe file stem.
///
/// `[A-Za-z0-9_-]` is kept, every other character becomes `_`, and an empty
/// id becomes `unknown`.
pub fn sanitize_peer_id(peer: &str) -> String {
    if peer.is_empty() {
        return "unknown".to_string();
    }
    peer.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Quarantine directory rooted at one path.
#[derive(Debug, Clone)]
pub struct Quarantine {
    root: PathBuf,
}

impl Quarantine {
    /// Quarantine under `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds `peer`'s blocks parked for `reason`.
    pub fn path_for(&self, peer: &str, reason: QuarantineReason) -> PathBuf {
        self.root
            .join(reason.dir_name())
            .join(format!("{}.jsonl", sanitize_peer_id(peer)))
    }

    /// Append one raw frame to the peer's file for `reason`.
    ///
    /// Returns the file written to.
    pub async fn park(&self, peer: &str, reason: QuarantineReason, raw: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(peer, reason);
        let raw = raw.to_vec();
        let target = path.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir)?;
            }
            append_line_blocking(&target, &raw)
        })
        .await??;

        Ok(path)
    }

    /// Lines parked for `peer` under `reason`, oldest first.
    pub async fn read(&self, peer: &str, reason: QuarantineReason) -> Result<Vec<Vec<u8>>> {
        let path = self.path_for(peer, reason);
        tokio::task::spawn_blocking(move || read_lines_blocking(&path)).await?
    }
}
