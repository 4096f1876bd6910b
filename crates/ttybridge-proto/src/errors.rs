//! Protocol error types.

use thiserror::Error;

/// Errors produced while framing or interpreting messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Message had no bytes at all, so not even a command tag.
    #[error("empty message: every frame starts with a command byte")]
    EmptyMessage,

    /// First byte is not a command the receiver understands.
    #[error("unknown command {0:#04x}")]
    UnknownCommand(u8),

    /// Payload of a JSON-carrying command failed to parse.
    #[error("invalid JSON payload for command '{command}': {reason}")]
    InvalidJson {
        /// Command tag as an ASCII character.
        command: char,
        /// Parser error message.
        reason: String,
    },

    /// A JSON payload could not be serialized.
    #[error("failed to encode JSON payload: {0}")]
    JsonEncode(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
