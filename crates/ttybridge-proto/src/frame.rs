//! Command-tagged frame.
//!
//! Layout on the wire: `[command: 1 byte] + [payload: remaining bytes]`.
//!
//! A `Frame` is a pure data holder. It does not interpret its payload; see
//! [`crate::ServerMessage::from_frame`] and [`crate::ClientMessage::encode`]
//! for the typed views.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    ClientCommand, ServerCommand,
    errors::{ProtocolError, Result},
};

/// One transport message: a command byte and its payload.
///
/// # Invariants
///
/// - The first wire byte is always `command`, never payload.
/// - `payload` may be empty; the frame itself never is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command tag (ASCII digit for known commands).
    pub command: u8,

    /// Payload bytes following the tag.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from a raw command byte.
    #[must_use]
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Self {
        Self { command, payload: payload.into() }
    }

    /// Create a client-to-server frame.
    #[must_use]
    pub fn client(command: ClientCommand, payload: impl Into<Bytes>) -> Self {
        Self::new(command.to_u8(), payload)
    }

    /// Create a server-to-client frame.
    #[must_use]
    pub fn server(command: ServerCommand, payload: impl Into<Bytes>) -> Self {
        Self::new(command.to_u8(), payload)
    }

    /// Encoded length in bytes (tag plus payload).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Command interpreted as a client command.
    #[must_use]
    pub fn client_command(&self) -> Option<ClientCommand> {
        ClientCommand::from_u8(self.command)
    }

    /// Command interpreted as a server command.
    #[must_use]
    pub fn server_command(&self) -> Option<ServerCommand> {
        ServerCommand::from_u8(self.command)
    }

    /// Encode frame into buffer.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.command);
        dst.put_slice(&self.payload);
    }

    /// Encode frame into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a frame from one complete transport message.
    ///
    /// Does not validate the command; unknown tags are the caller's decision.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyMessage` if `bytes` is empty
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&command, payload) = bytes.split_first().ok_or(ProtocolError::EmptyMessage)?;
        Ok(Self { command, payload: Bytes::copy_from_slice(payload) })
    }
}
