//! Wire protocol for drpc.
//!
//! This crate defines what travels over the IPC stream:
//!
//! - **Frames** ([`Frame`], [`OpCode`], [`encode`], [`decode_header`]):
//!   the 8-byte header + payload envelope.
//! - **Messages** ([`Handshake`], [`Request`], [`IncomingMessage`],
//!   [`Dispatch`], [`CloseReason`]): the JSON documents inside frames.
//! - **Presence** ([`Presence`], [`Activity`]): the validated status record
//!   and its wire form.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ messages.
//!
//! It knows nothing about connections; the session layer owns those.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame, JSON) → Session (state machine)
//! ```

mod codec;
mod error;
mod frame;
mod message;
mod presence;

pub use codec::{Codec, JsonCodec};
pub use error::{ProtocolError, ValidationError};
pub use frame::{
    decode_header, encode, Frame, FrameHeader, OpCode, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE,
};
pub use message::{
    CloseReason, Dispatch, Handshake, IncomingMessage, Reply, Request, RpcCommand,
    SetActivityArgs, Subscription, User, UserArgs, RPC_VERSION,
};
pub use presence::{
    Activity, Assets, Party, Presence, Secrets, Timestamps, MAX_IMAGE_KEY_LEN, MAX_TEXT_LEN,
};
