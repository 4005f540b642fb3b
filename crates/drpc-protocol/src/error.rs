//! Error types for the protocol layer.
//!
//! Two kinds of failure live here: [`ProtocolError`] for bytes that can't
//! be framed or parsed, and [`ValidationError`] for presence values the
//! caller tried to set. They are kept apart because a validation error is
//! a caller mistake and never reaches the wire.

/// Errors that can occur while framing or (de)serializing messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or wrong data types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A frame header carried an opcode outside `0..=4`.
    #[error("unknown opcode {0}")]
    UnknownOpCode(u32),

    /// The frame would exceed the maximum frame size.
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Payload length that was attempted or announced.
        len: usize,
        /// Largest payload a frame can carry.
        max: usize,
    },

    /// The message parsed but violates protocol rules, e.g. a dispatch
    /// without its `data` object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// A presence field was assigned a value longer than its limit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} must not be longer than {max} characters, got {len}")]
pub struct ValidationError {
    /// Name of the rejected field.
    pub field: &'static str,
    /// Maximum length in characters.
    pub max: usize,
    /// Length of the rejected value in characters.
    pub len: usize,
}
