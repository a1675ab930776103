//! Output stream collection
//!
//! Reader tasks forward raw chunks from a child's stdout and stderr; the
//! aggregator appends them in arrival order. Nothing is parsed here, so a
//! line split across chunks is reassembled simply by concatenation.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 8192;

/// Which standard stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A chunk of bytes read from one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub kind: StreamKind,
    pub data: Vec<u8>,
}

impl StreamChunk {
    pub fn stdout(data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: StreamKind::Stdout,
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: StreamKind::Stderr,
            data: data.into(),
        }
    }
}

/// Everything captured from one process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Set when either stream exceeded the capture limit
    pub truncated: bool,
}

/// Collects stdout and stderr chunks into two growable buffers
#[derive(Debug)]
pub struct StreamAggregator {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// Per-stream capture limit in bytes
    limit: usize,
    truncated: bool,
}

impl StreamAggregator {
    pub fn new(limit: usize) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Append a chunk to its stream's buffer
    pub fn push(&mut self, chunk: StreamChunk) {
        let buffer = match chunk.kind {
            StreamKind::Stdout => &mut self.stdout,
            StreamKind::Stderr => &mut self.stderr,
        };
        let room = self.limit.saturating_sub(buffer.len());
        if chunk.data.len() > room {
            buffer.extend_from_slice(&chunk.data[..room]);
            self.truncated = true;
        } else {
            buffer.extend_from_slice(&chunk.data);
        }
    }

    pub fn finish(self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout,
            stderr: self.stderr,
            truncated: self.truncated,
        }
    }
}

/// Read a stream to its end, forwarding every chunk
///
/// Stops early when the receiving side is gone.
pub(crate) async fn pump<R>(mut reader: R, kind: StreamKind, tx: UnboundedSender<StreamChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = StreamChunk {
                    kind,
                    data: buf[..n].to_vec(),
                };
                if tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(?kind, error = %e, "stream read failed");
                break;
            }
        }
    }
}
