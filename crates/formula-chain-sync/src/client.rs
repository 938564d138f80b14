//! Outbound role: pull missing blocks from one peer.
//!
//! Every received frame is classified against the running local head:
//!
//! - **foreign**: the peer answered `STATUS foreign`, or the block carries a
//!   different config fingerprint
//! - **conflicting**: same ruleset, but the block does not extend the local
//!   head (wrong step, wrong `prev`, bad hash or HMAC)
//! - **acceptable**: appended verbatim and becomes the new head
//!
//! Foreign and conflicting frames are parked in quarantine. The local chain
//! is never rewritten.

use formula_chain_core::{decode_record, ChainCursor};
use formula_chain_store::{Ledger, Quarantine, QuarantineReason};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::messages::{Line, PeerStatus};
use crate::protocol::{banner, send_identity, LineBudget, PeerSummary, ProtocolConfig};
use crate::transport::{connect, LineReader, LineWriter};

/// Outcome of one pull.
#[derive(Debug, Clone, Default)]
pub struct PullReport {
    /// The serving peer's handshake.
    pub peer: PeerSummary,
    /// Frames received.
    pub received: u64,
    /// Blocks appended to the local chain.
    pub appended: u64,
    /// Frames parked as foreign.
    pub foreign: u64,
    /// Frames parked as conflicting.
    pub conflicting: u64,
}

/// Connect to `host:port` and pull.
///
/// Quarantine files are keyed by the peer's advertised node id, or
/// `<host>_<port>` when it advertises none.
///
/// The caller must hold the chain's mutator lock for the whole call.
pub async fn pull_from_peer<L>(
    host: &str,
    port: u16,
    ledger: &L,
    quarantine: &Quarantine,
    config: &ProtocolConfig,
) -> Result<PullReport>
where
    L: Ledger + ?Sized,
{
    let stream = connect(host, port, config.io_timeout).await?;
    let fallback = format!("{}_{}", host, port);
    pull_over(stream, &fallback, ledger, quarantine, config).await
}

/// Pull over an already connected stream.
pub async fn pull_over<L, S>(
    stream: S,
    fallback_label: &str,
    ledger: &L,
    quarantine: &Quarantine,
    config: &ProtocolConfig,
) -> Result<PullReport>
where
    L: Ledger + ?Sized,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = LineReader::new(read_half, config.io_timeout);
    let mut writer = LineWriter::new(write_half, config.io_timeout);

    let local = ledger.summarize(config.fingerprint).await?;

    writer.send(&banner()).await?;
    send_identity(&mut writer, config, &local).await?;
    writer.send(&Line::Request(local.next_step())).await?;
    writer.send(&Line::Trust(config.trust_ratio)).await?;
    writer.send(&Line::End).await?;
    writer.flush().await?;

    let mut report = PullReport::default();
    let mut cursor = ChainCursor::at(local.height, local.head_hash);
    let mut budget = LineBudget::default();

    loop {
        match reader.next_line().await? {
            Line::Block { step, len } => {
                let frame = reader.read_frame(len).await?;
                let record =
                    decode_record(&frame).map_err(|source| SyncError::Frame { step, source })?;
                if record.step() != step {
                    return Err(SyncError::protocol(format!(
                        "BLOCK header says step {} but frame holds step {}",
                        step,
                        record.step()
                    )));
                }
                report.received += 1;

                let verdict = if report.peer.status == Some(PeerStatus::Foreign)
                    || record.block.config_fingerprint != config.fingerprint
                {
                    Some(QuarantineReason::Foreign)
                } else if let Err(e) = cursor.check(&record, ledger.hmac_key()) {
                    debug!(step, reason = e.reason(), "block does not extend local head");
                    Some(QuarantineReason::Conflict)
                } else {
                    None
                };

                match verdict {
                    None => {
                        ledger.append_record(&record).await?;
                        cursor.advance(&record);
                        report.appended += 1;
                    }
                    Some(reason) => {
                        let label = report.peer.label_or(fallback_label).to_string();
                        let path = quarantine.park(&label, reason, &frame).await?;
                        warn!(peer = %label, step, %reason, path = %path.display(), "quarantined block");
                        match reason {
                            QuarantineReason::Foreign => report.foreign += 1,
                            QuarantineReason::Conflict => report.conflicting += 1,
                        }
                    }
                }
            }
            Line::End => break,
            Line::Unknown(raw) => {
                budget.charge()?;
                debug!(line = %raw, "ignoring unknown line");
            }
            other => {
                budget.charge()?;
                report.peer.apply(&other);
            }
        }
    }

    // The peer has already said END; a failed close changes nothing.
    let _ = writer.shutdown().await;

    info!(
        peer = report.peer.label_or(fallback_label),
        appended = report.appended,
        foreign = report.foreign,
        conflicting = report.conflicting,
        "pull finished"
    );
    Ok(report)
}
