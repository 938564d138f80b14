//! Inbound role: answer one pull request and close.

use formula_chain_core::encode_record;
use formula_chain_store::Ledger;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::Result;
use crate::messages::{Line, PeerStatus};
use crate::protocol::{banner, read_handshake, send_identity, PeerSummary, ProtocolConfig};
use crate::transport::{LineReader, LineWriter};

/// Outcome of serving one connection.
#[derive(Debug, Clone)]
pub struct ServeReport {
    /// The puller's handshake.
    pub peer: PeerSummary,
    pub status: PeerStatus,
    /// First step streamed (the puller's `REQUEST`, or 0).
    pub from_step: u64,
    /// Number of `BLOCK` frames sent.
    pub sent: u64,
}

/// Serve one inbound connection to completion.
///
/// Reads the puller's handshake, answers with the local summary and streams
/// every block from the requested step. Blocks are streamed even when the
/// status is `foreign`; the puller quarantines them. The ledger is only read.
pub async fn serve_connection<L, S>(
    stream: S,
    ledger: &L,
    config: &ProtocolConfig,
) -> Result<ServeReport>
where
    L: Ledger + ?Sized,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = LineReader::new(read_half, config.io_timeout);
    let mut writer = LineWriter::new(write_half, config.io_timeout);

    let peer = read_handshake(&mut reader).await?;
    let from_step = peer.request.unwrap_or(0);
    let status = if peer.is_foreign_to(&config.fingerprint) {
        PeerStatus::Foreign
    } else {
        PeerStatus::Ok
    };

    let local = ledger.summarize(config.fingerprint).await?;
    debug!(
        peer = peer.label_or("?"),
        from_step,
        height = local.height,
        "serving pull"
    );

    writer.send(&banner()).await?;
    writer.send(&Line::Status(status)).await?;
    send_identity(&mut writer, config, &local).await?;

    let mut sent = 0u64;
    if local.height > from_step {
        for record in ledger.records_from(from_step).await? {
            writer
                .send_frame(record.step(), encode_record(&record).as_bytes())
                .await?;
            sent += 1;
        }
    }

    writer.send(&Line::End).await?;
    writer.shutdown().await?;

    info!(
        peer = peer.label_or("?"),
        from_step,
        sent,
        foreign = status == PeerStatus::Foreign,
        "served pull"
    );

    Ok(ServeReport {
        peer,
        status,
        from_step,
        sent,
    })
}
