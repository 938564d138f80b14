//! Line and frame transport over any async byte stream.
//!
//! Every read and flush goes through an optional timeout. `None` blocks
//! indefinitely.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::messages::{limits, Line};

async fn bounded<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SyncError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Open a TCP connection to `host:port` within `timeout`.
pub async fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let addr = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    bounded(timeout, async { Ok(TcpStream::connect(addr.as_str()).await?) }).await
}

/// Reads bounded protocol lines and exact-length frames.
pub struct LineReader<R> {
    inner: BufReader<R>,
    timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, timeout: Option<Duration>) -> Self {
        Self {
            inner: BufReader::new(inner),
            timeout,
        }
    }

    /// Read one raw line without its terminator.
    ///
    /// Returns `None` on a clean end of stream. A trailing `\r` is dropped.
    pub async fn read_raw(&mut self) -> Result<Option<String>> {
        let timeout = self.timeout;
        let inner = &mut self.inner;

        bounded(timeout, async move {
            let mut buf = Vec::new();
            let mut limited = inner.take(limits::MAX_LINE_LEN as u64 + 1);
            let n = limited.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                return Ok(None);
            }

            if buf.last() != Some(&b'\n') {
                return Err(if buf.len() > limits::MAX_LINE_LEN {
                    SyncError::protocol("line exceeds length limit")
                } else {
                    SyncError::protocol("stream ended mid-line")
                });
            }
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }

            String::from_utf8(buf)
                .map(Some)
                .map_err(|_| SyncError::protocol("line is not valid UTF-8"))
        })
        .await
    }

    /// Read and parse the next line. End of stream is a protocol error.
    pub async fn next_line(&mut self) -> Result<Line> {
        match self.read_raw().await? {
            Some(raw) => {
                debug!(line = %raw, "recv");
                Line::parse(&raw)
            }
            None => Err(SyncError::protocol("peer closed before END")),
        }
    }

    /// Read a `len`-byte frame body and its terminating newline.
    pub async fn read_frame(&mut self, len: usize) -> Result<Bytes> {
        let timeout = self.timeout;
        let inner = &mut self.inner;

        bounded(timeout, async move {
            let mut body = vec![0u8; len];
            inner.read_exact(&mut body).await?;
            if inner.read_u8().await? != b'\n' {
                return Err(SyncError::protocol("frame not terminated by newline"));
            }
            Ok(Bytes::from(body))
        })
        .await
    }
}

/// Writes protocol lines and frames through a buffer.
pub struct LineWriter<W> {
    inner: BufWriter<W>,
    timeout: Option<Duration>,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W, timeout: Option<Duration>) -> Self {
        Self {
            inner: BufWriter::new(inner),
            timeout,
        }
    }

    /// Queue one line.
    pub async fn send(&mut self, line: &Line) -> Result<()> {
        debug!(line = %line, "send");
        let mut text = line.to_string();
        text.push('\n');
        self.write(text.as_bytes()).await
    }

    /// Queue a `BLOCK` header followed by its frame.
    pub async fn send_frame(&mut self, step: u64, frame: &[u8]) -> Result<()> {
        self.send(&Line::Block {
            step,
            len: frame.len(),
        })
        .await?;
        self.write(frame).await?;
        self.write(b"\n").await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let inner = &mut self.inner;
        bounded(timeout, async move { Ok(inner.write_all(bytes).await?) }).await
    }

    /// Push everything queued to the peer.
    pub async fn flush(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let inner = &mut self.inner;
        bounded(timeout, async move { Ok(inner.flush().await?) }).await
    }

    /// Flush and close the write side.
    pub async fn shutdown(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let inner = &mut self.inner;
        bounded(timeout, async move { Ok(inner.shutdown().await?) }).await
    }
}
