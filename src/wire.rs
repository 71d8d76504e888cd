//! Snapshot framing for peer connections.
//!
//! A frame is a 4-byte big-endian body length followed by the JSON encoding of
//! a [`Snapshot`]. The server writes exactly one frame per connection and
//! closes, so a reader never has to guess where a snapshot ends.

use std::io::{ErrorKind, Read, Write};

use crate::error::{BoardError, Result};
use crate::model::Snapshot;

pub const HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(snapshot)?;
    let len = body.len() as u64;
    if len > MAX_FRAME_LEN {
        return Err(BoardError::FrameTooLarge(len));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(len as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_body(body: &[u8]) -> Result<Snapshot> {
    serde_json::from_slice(body).map_err(|e| BoardError::Decode(e.to_string()))
}

pub fn write_snapshot<W: Write>(writer: &mut W, snapshot: &Snapshot) -> Result<()> {
    let frame = encode(snapshot)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<Snapshot> {
    let mut header = [0_u8; HEADER_LEN];
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            BoardError::Decode("stream closed before frame header".to_string())
        }
        _ => BoardError::Io(e),
    })?;

    let len = u64::from(u32::from_be_bytes(header));
    if len > MAX_FRAME_LEN {
        return Err(BoardError::FrameTooLarge(len));
    }

    // Grow with the bytes that actually arrive; the header is untrusted.
    let mut body = Vec::new();
    reader.take(len).read_to_end(&mut body)?;
    if (body.len() as u64) < len {
        return Err(BoardError::Decode(format!(
            "truncated frame: expected {len} bytes, got {}",
            body.len()
        )));
    }

    decode_body(&body)
}
