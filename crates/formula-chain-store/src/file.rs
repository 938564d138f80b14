//! Flat-file implementation of the Ledger trait.
//!
//! One canonical record per line, `\n` terminated. File I/O is blocking and
//! runs on tokio's blocking pool via `spawn_blocking`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use formula_chain_core::HmacKey;

use crate::error::Result;
use crate::traits::Ledger;

/// Chain stored as a newline-delimited file.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
    key: Option<HmacKey>,
}

impl FileLedger {
    /// Open (or prepare to create) a chain file at `path`.
    ///
    /// Parent directories are created. The file itself is created on the
    /// first append; a missing file reads as an empty chain.
    pub fn open(path: impl Into<PathBuf>, key: Option<HmacKey>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path, key })
    }

    /// Location of the chain file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Split file contents into lines, dropping the final terminator.
pub(crate) fn split_lines(bytes: &[u8]) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    body.split(|b| *b == b'\n').map(<[u8]>::to_vec).collect()
}

/// Read a whole line-oriented file; a missing file is empty.
pub(crate) fn read_lines_blocking(path: &Path) -> Result<Vec<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(split_lines(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Append `line` plus a terminator with a single write.
pub(crate) fn append_line_blocking(path: &Path, line: &[u8]) -> Result<()> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line);
    buf.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&buf)?;
    file.flush()?;
    Ok(())
}

#[async_trait]
impl Ledger for FileLedger {
    async fn read_lines(&self) -> Result<Vec<Vec<u8>>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_lines_blocking(&path)).await?
    }

    async fn write_line(&self, line: String) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line_blocking(&path, line.as_bytes())).await?
    }

    fn hmac_key(&self) -> Option<&HmacKey> {
        self.key.as_ref()
    }
}
