//! Shared protocol state: local identity, handshake collection, peer views.

use std::time::Duration;

use formula_chain_core::{ChainSummary, Sha256Hash};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::messages::{limits, Line, PeerStatus, PROTOCOL_VERSION};
use crate::transport::{LineReader, LineWriter};

/// Identity and knobs a node brings to every connection.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Id advertised in `NODE`.
    pub node_id: String,
    /// Fingerprint advertised in `FP` and compared against incoming blocks.
    pub fingerprint: Sha256Hash,
    /// Advertised in `TRUST`. Informational; no side enforces it.
    pub trust_ratio: f64,
    /// Per-read timeout; `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
}

impl ProtocolConfig {
    pub fn new(node_id: impl Into<String>, fingerprint: Sha256Hash) -> Self {
        Self {
            node_id: node_id.into(),
            fingerprint,
            trust_ratio: 0.5,
            io_timeout: None,
        }
    }

    pub fn with_trust_ratio(mut self, ratio: f64) -> Self {
        self.trust_ratio = ratio;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }
}

/// What a peer told us about itself. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerSummary {
    pub version: Option<u32>,
    pub node_id: Option<String>,
    pub fingerprint: Option<Sha256Hash>,
    pub height: Option<u64>,
    pub head_hash: Option<Sha256Hash>,
    /// Only sent by the serving side.
    pub status: Option<PeerStatus>,
    /// Only sent by the pulling side.
    pub request: Option<u64>,
    /// Only sent by the pulling side.
    pub trust: Option<f64>,
}

impl PeerSummary {
    /// Fold one handshake line into the summary.
    ///
    /// Returns `false` for lines that carry no handshake field.
    pub fn apply(&mut self, line: &Line) -> bool {
        match line {
            Line::Banner(v) => self.version = Some(*v),
            Line::Node(id) => self.node_id = Some(id.clone()),
            Line::Fp(fp) => self.fingerprint = *fp,
            Line::Height(h) => self.height = Some(*h),
            Line::Hash(h) => self.head_hash = *h,
            Line::Status(s) => self.status = Some(*s),
            Line::Request(step) => self.request = Some(*step),
            Line::Trust(ratio) => self.trust = Some(*ratio),
            Line::Block { .. } | Line::End | Line::Unknown(_) => return false,
        }
        true
    }

    /// True when the peer declared a fingerprint that differs from ours.
    pub fn is_foreign_to(&self, local: &Sha256Hash) -> bool {
        matches!(self.fingerprint, Some(fp) if fp != *local)
    }

    /// Advertised node id if non-empty, else `fallback`.
    pub fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.node_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => fallback,
        }
    }
}

/// Counts non-`BLOCK` lines against the handshake budget.
#[derive(Debug, Default)]
pub(crate) struct LineBudget {
    used: usize,
}

impl LineBudget {
    pub(crate) fn charge(&mut self) -> Result<()> {
        self.used += 1;
        if self.used > limits::MAX_HANDSHAKE_LINES {
            return Err(SyncError::protocol(format!(
                "more than {} handshake lines",
                limits::MAX_HANDSHAKE_LINES
            )));
        }
        Ok(())
    }
}

/// Read handshake lines up to and including `END`.
///
/// A `BLOCK` line before `END` is a protocol error.
pub(crate) async fn read_handshake<R>(reader: &mut LineReader<R>) -> Result<PeerSummary>
where
    R: AsyncRead + Unpin,
{
    let mut summary = PeerSummary::default();
    let mut budget = LineBudget::default();

    loop {
        budget.charge()?;
        let line = reader.next_line().await?;
        match line {
            Line::End => return Ok(summary),
            Line::Block { .. } => return Err(SyncError::protocol("BLOCK inside handshake")),
            Line::Unknown(raw) => debug!(line = %raw, "ignoring unknown handshake line"),
            other => {
                summary.apply(&other);
            }
        }
    }
}

/// Write the identity lines both roles send after the banner.
pub(crate) async fn send_identity<W>(
    writer: &mut LineWriter<W>,
    config: &ProtocolConfig,
    local: &ChainSummary,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.send(&Line::Node(config.node_id.clone())).await?;
    writer.send(&Line::Fp(Some(config.fingerprint))).await?;
    writer.send(&Line::Height(local.height)).await?;
    writer.send(&Line::Hash(local.head_hash)).await
}

pub(crate) fn banner() -> Line {
    Line::Banner(PROTOCOL_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_foreign() {
        let local = Sha256Hash::hash(b"local");
        let mut peer = PeerSummary::default();
        assert!(!peer.is_foreign_to(&local));

        assert!(peer.apply(&Line::Fp(Some(local))));
        assert!(!peer.is_foreign_to(&local));

        peer.apply(&Line::Fp(Some(Sha256Hash::hash(b"other"))));
        assert!(peer.is_foreign_to(&local));

        assert!(!peer.apply(&Line::End));
        assert!(!peer.apply(&Line::Unknown("X".into())));
    }

    #[test]
    fn test_label_fallback() {
        let mut peer = PeerSummary::default();
        assert_eq!(peer.label_or("10.0.0.2_7000"), "10.0.0.2_7000");
        peer.apply(&Line::Node(String::new()));
        assert_eq!(peer.label_or("h_1"), "h_1");
        peer.apply(&Line::Node("node-b".into()));
        assert_eq!(peer.label_or("h_1"), "node-b");
    }

    #[tokio::test]
    async fn test_handshake_budget() {
        let mut input = String::new();
        for _ in 0..limits::MAX_HANDSHAKE_LINES {
            input.push_str("PING\n");
        }
        input.push_str("END\n");
        let mut reader = LineReader::new(input.as_bytes(), None);
        assert!(matches!(
            read_handshake(&mut reader).await,
            Err(SyncError::Protocol(_))
        ));

        let mut reader = LineReader::new(&b"SYNC/1\nNODE a\nREQUEST 4\nTRUST 0.5\nEND\n"[..], None);
        let summary = read_handshake(&mut reader).await.unwrap();
        assert_eq!(summary.version, Some(1));
        assert_eq!(summary.node_id.as_deref(), Some("a"));
        assert_eq!(summary.request, Some(4));
        assert_eq!(summary.trust, Some(0.5));
    }
}
