//! Delimiter-based message framing for JSON-RPC over TCP.
//!
//! Every message is a single encoded JSON value followed by a delimiter
//! (a newline unless configured otherwise). TCP delivers a byte stream, so
//! incoming bytes are accumulated in a [`FrameBuffer`] until the delimiter
//! shows up.
//!
//! # Wire Format
//!
//! ```text
//! <message-body><delimiter>
//! ```
//!
//! The delimiter is searched for anywhere in the accumulated bytes, including
//! across read boundaries. Only the first frame is returned; anything that
//! follows it in the buffer is discarded, since at most one response is ever
//! outstanding.

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Framing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The peer sent more bytes than allowed without a delimiter.
    #[error("Frame size {size} exceeds maximum {max} bytes")]
    TooLarge { size: usize, max: usize },
}

/// Accumulates stream bytes and yields delimiter-terminated frames.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    delimiter: Vec<u8>,
    max_frame_size: usize,
    /// Offset below which no delimiter can start.
    scanned: usize,
}

impl FrameBuffer {
    /// Create an empty buffer for `delimiter`.
    ///
    /// # Panics
    ///
    /// Panics if `delimiter` is empty; configs are validated before a buffer
    /// is ever built.
    pub fn new(delimiter: &[u8], max_frame_size: usize) -> Self {
        assert!(!delimiter.is_empty(), "frame delimiter must not be empty");
        Self {
            buf: Vec::new(),
            delimiter: delimiter.to_vec(),
            max_frame_size,
            scanned: 0,
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything buffered so far.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    /// Append freshly read bytes and try to cut a frame.
    ///
    /// Returns `Ok(Some(frame))` with the delimiter stripped once a complete
    /// frame is available, `Ok(None)` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the pending frame is already longer
    /// than the configured maximum.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, FrameError> {
        self.buf.extend_from_slice(bytes);

        match self.find_delimiter() {
            Some(pos) => {
                if pos > self.max_frame_size {
                    return Err(FrameError::TooLarge {
                        size: pos,
                        max: self.max_frame_size,
                    });
                }
                let frame = self.buf[..pos].to_vec();
                self.clear();
                Ok(Some(frame))
            }
            None => {
                if self.buf.len() > self.max_frame_size {
                    return Err(FrameError::TooLarge {
                        size: self.buf.len(),
                        max: self.max_frame_size,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Position of the first delimiter occurrence, scanning only bytes that
    /// could not be ruled out by an earlier call.
    fn find_delimiter(&mut self) -> Option<usize> {
        let width = self.delimiter.len();
        if self.buf.len() < width {
            return None;
        }

        let found = self.buf[self.scanned..]
            .windows(width)
            .position(|window| window == self.delimiter.as_slice())
            .map(|offset| self.scanned + offset);

        if found.is_none() {
            // A delimiter may still straddle the tail and the next read.
            self.scanned = self.buf.len() + 1 - width;
        }
        found
    }
}

/// Write one frame (body followed by delimiter) and flush.
///
/// Body and delimiter go out in a single write so a frame is never split by
/// the client itself.
///
/// # Errors
///
/// Returns the underlying I/O error if the write or flush fails.
pub async fn write_frame<W>(writer: &mut W, body: &[u8], delimiter: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(body.len() + delimiter.len());
    frame.extend_from_slice(body);
    frame.extend_from_slice(delimiter);

    writer.write_all(&frame).await?;
    writer.flush().await
}
