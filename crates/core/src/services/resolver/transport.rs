//! `Content-Length` message framing over a byte stream.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use thiserror::Error;

const CONTENT_LENGTH: &str = "content-length";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("frame is missing a Content-Length header")]
    MissingLength,
    #[error("invalid Content-Length header: {0:?}")]
    InvalidLength(String),
    #[error("frame body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FrameError {
    /// Whether the stream is still positioned at a frame boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Json(_))
    }
}

/// Read one framed JSON message.
///
/// Returns `Ok(None)` on a clean end of stream before any header byte.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<Value>, FrameError> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut first = true;

    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            if first {
                return Ok(None);
            }
            let err = io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended inside headers");
            return Err(err.into());
        }
        first = false;

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((key, value)) = header.split_once(':') {
            if key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let value = value.trim();
                content_length =
                    Some(value.parse().map_err(|_| FrameError::InvalidLength(value.to_string()))?);
            }
        }
    }

    let length = content_length.ok_or(FrameError::MissingLength)?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// Write one framed JSON message and flush.
pub fn write_message<W: Write + ?Sized>(writer: &mut W, message: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()
}
