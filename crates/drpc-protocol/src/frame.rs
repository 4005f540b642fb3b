//! Length-prefixed wire frames.
//!
//! Every message on the IPC stream is one frame:
//!
//! ```text
//! offset 0: opcode   u32 little-endian   (0=Handshake, 1=Frame, 2=Close, 3=Ping, 4=Pong)
//! offset 4: length   u32 little-endian   (payload byte count)
//! offset 8: payload  `length` bytes      (UTF-8 JSON, or opaque for Ping/Pong)
//! ```
//!
//! A whole frame, header included, never exceeds [`MAX_FRAME_SIZE`].

use std::fmt;

use serde::Serialize;

use crate::{Codec, ProtocolError};

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest frame the peer accepts, header included.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// Frame type, sent as the first header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    /// Client → peer: protocol version and application id.
    Handshake = 0,
    /// A JSON command or dispatch.
    Frame = 1,
    /// Either direction: the connection is closing, with `{code, message}`.
    Close = 2,
    /// Keep-alive probe. Must be answered with a [`OpCode::Pong`] echoing
    /// the payload.
    Ping = 3,
    /// Keep-alive answer.
    Pong = 4,
}

impl TryFrom<u32> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::Frame),
            2 => Ok(Self::Close),
            3 => Ok(Self::Ping),
            4 => Ok(Self::Pong),
            other => Err(ProtocolError::UnknownOpCode(other)),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Handshake => "Handshake",
            Self::Frame => "Frame",
            Self::Close => "Close",
            Self::Ping => "Ping",
            Self::Pong => "Pong",
        };
        f.write_str(name)
    }
}

/// The decoded 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame type.
    pub opcode: OpCode,
    /// Payload length in bytes. Always `<= MAX_PAYLOAD_SIZE`.
    pub length: u32,
}

impl FrameHeader {
    /// Parses a header, rejecting unknown opcodes and oversized lengths.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self, ProtocolError> {
        let (op, len) = bytes.split_at(4);
        let opcode = u32::from_le_bytes([op[0], op[1], op[2], op[3]]);
        let length = u32::from_le_bytes([len[0], len[1], len[2], len[3]]);

        if length as usize > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                len: length as usize,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            opcode: OpCode::try_from(opcode)?,
            length,
        })
    }

    /// Serializes the header.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&(self.opcode as u32).to_le_bytes());
        out[4..].copy_from_slice(&self.length.to_le_bytes());
        out
    }
}

/// One complete frame: opcode plus payload bytes.
///
/// Frames are built per send or receive and never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type.
    pub opcode: OpCode,
    /// Raw payload (JSON for Handshake/Frame/Close).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame from raw payload bytes.
    pub fn new(opcode: OpCode, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// Creates a frame whose payload is `value` serialized with `codec`.
    pub fn json<T: Serialize>(
        opcode: OpCode,
        value: &T,
        codec: &impl Codec,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(opcode, codec.encode(value)?))
    }

    /// The header describing this frame.
    ///
    /// Fails if the payload is too large to frame.
    pub fn header(&self) -> Result<FrameHeader, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(FrameHeader {
            opcode: self.opcode,
            length: self.payload.len() as u32,
        })
    }

    /// Header followed by payload, ready to write to the transport.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self.opcode, &self.payload)
    }

    /// Parses one complete frame from `bytes`. Trailing bytes beyond the
    /// announced length are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let header: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| ProtocolError::InvalidMessage("truncated frame header".into()))?;
        let header = FrameHeader::decode(header)?;

        let body = &bytes[HEADER_SIZE..];
        if body.len() != header.length as usize {
            return Err(ProtocolError::InvalidMessage(format!(
                "frame announces {} payload bytes but carries {}",
                header.length,
                body.len()
            )));
        }
        Ok(Self::new(header.opcode, body.to_vec()))
    }
}

/// Prefixes `payload` with its header.
///
/// Oversized payloads are rejected whole; nothing is truncated.
pub fn encode(opcode: OpCode, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let header = FrameHeader {
        opcode,
        length: payload.len() as u32,
    };
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Inverse of the header half of [`encode`].
pub fn decode_header(bytes: &[u8; HEADER_SIZE]) -> Result<(OpCode, u32), ProtocolError> {
    let header = FrameHeader::decode(bytes)?;
    Ok((header.opcode, header.length))
}
