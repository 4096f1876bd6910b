//! Wire protocol for ttybridge.
//!
//! Every message on the transport is a single-byte command tag followed by a
//! payload. The tag is an ASCII digit; its meaning depends on direction:
//!
//! | Byte  | Client → Server            | Server → Client            |
//! |-------|----------------------------|----------------------------|
//! | `'0'` | terminal input (raw bytes) | terminal output (raw)      |
//! | `'1'` | window size (JSON)         | window title (UTF-8)       |
//! | `'2'` |                            | preferences (JSON object)  |
//! | `'3'` |                            | reconnect seconds (JSON)   |
//!
//! The one exception is the authentication handshake, which the client sends
//! as a bare JSON object immediately after the transport opens.
//!
//! This crate is pure: no I/O, no clocks. See [`Frame`] for the framing,
//! [`ServerMessage`] for inbound decoding and [`ClientMessage`] for outbound
//! encoding.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chunk;
mod command;
pub mod errors;
mod frame;
mod message;
pub mod payloads;

pub use chunk::{MAX_CHUNK_PAYLOAD, chunk_input};
pub use command::{ClientCommand, ServerCommand};
pub use errors::ProtocolError;
pub use frame::Frame;
pub use message::{ClientMessage, ServerMessage};
pub use payloads::{
    AuthRequest, MAX_RECONNECT_INTERVAL, Preferences, ReconnectPolicy, ServerConfig, WindowSize,
};
