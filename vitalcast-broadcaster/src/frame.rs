//! Viewer framing
//!
//! Every message to a viewer is `[kind: u8][len: u32 LE][payload]`. The hub
//! never looks inside the payload; the kind tag tells the viewer whether it
//! is UTF-8 JSON (a rate event) or packed `f32` samples (a wave batch).

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{BroadcasterError, Result};

/// Frame header size in bytes
pub const HEADER_LEN: usize = 5;

/// Largest payload a reader will accept
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Content kind carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Binary,
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        match self {
            MessageKind::Text => 1,
            MessageKind::Binary => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(MessageKind::Text),
            2 => Ok(MessageKind::Binary),
            other => Err(BroadcasterError::UnknownFrameKind(other)),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Binary => write!(f, "binary"),
        }
    }
}

/// Encode the header for a payload of `len` bytes
pub fn encode_header(kind: MessageKind, len: usize) -> Result<[u8; HEADER_LEN]> {
    if len > MAX_FRAME_LEN {
        return Err(BroadcasterError::FrameTooLarge(len));
    }
    let mut header = [0u8; HEADER_LEN];
    header[0] = kind.tag();
    header[1..].copy_from_slice(&(len as u32).to_le_bytes());
    Ok(header)
}

/// Read one frame. Returns `None` on a clean end of stream before a header.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<(MessageKind, Vec<u8>)>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let kind = MessageKind::from_tag(header[0])?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(BroadcasterError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some((kind, payload)))
}
