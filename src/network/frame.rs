//! Binary Chunk Framing
//!
//! Layout of a chunk frame on the wire (little-endian):
//!
//! ```text
//! [fcc: 4][name_len: u16][name: name_len][is_first: u8][is_last: u8][payload..]
//! ```
//!
//! Binary messages whose first four bytes are not a known format code are
//! treated as UTF-8 JSON envelopes.

use std::fmt;

use crate::network::protocol::{CodecError, Envelope};

/// Four-character format code identifying the content of a transfer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Profiler output uploaded by a player.
    pub const PROFILE_DATA: FourCc = FourCc(*b"PROF");
    /// Recorded session data pushed to a player.
    pub const SESSION_DATA: FourCc = FourCc(*b"SESS");

    /// Codes this crate understands.
    pub const KNOWN: [FourCc; 2] = [Self::PROFILE_DATA, Self::SESSION_DATA];

    /// Whether `self` is a known code.
    pub fn is_known(self) -> bool {
        Self::KNOWN.contains(&self)
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// One segment of a file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
    /// Content code.
    pub format: FourCc,
    /// Destination file name.
    pub filename: String,
    /// Opens the destination file.
    pub is_first: bool,
    /// Closes the destination file.
    pub is_last: bool,
    /// Segment bytes.
    pub payload: Vec<u8>,
}

const HEADER_FIXED: usize = 4 + 2;
const FLAGS_LEN: usize = 2;

impl ChunkFrame {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let name = self.filename.as_bytes();
        let name_len = u16::try_from(name.len())
            .map_err(|_| CodecError::FilenameTooLong(name.len()))?;

        let mut out = Vec::with_capacity(HEADER_FIXED + name.len() + FLAGS_LEN + self.payload.len());
        out.extend_from_slice(&self.format.0);
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(name);
        out.push(self.is_first as u8);
        out.push(self.is_last as u8);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_FIXED {
            return Err(CodecError::Truncated(bytes.len()));
        }

        let format = FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let name_len = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;

        let name_end = HEADER_FIXED + name_len;
        if bytes.len() < name_end + FLAGS_LEN {
            return Err(CodecError::Truncated(bytes.len()));
        }

        let filename = std::str::from_utf8(&bytes[HEADER_FIXED..name_end])
            .map_err(|_| CodecError::InvalidUtf8)?
            .to_string();

        Ok(Self {
            format,
            filename,
            is_first: bytes[name_end] != 0,
            is_last: bytes[name_end + 1] != 0,
            payload: bytes[name_end + FLAGS_LEN..].to_vec(),
        })
    }
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// JSON envelope.
    Envelope(Envelope),
    /// Binary chunk.
    Chunk(ChunkFrame),
}

impl Packet {
    /// Decode a text message.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        Envelope::from_json(text).map(Packet::Envelope)
    }

    /// Decode a binary message.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() >= 4 && FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]).is_known() {
            return ChunkFrame::decode(bytes).map(Packet::Chunk);
        }

        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Self::from_text(text)
    }
}
