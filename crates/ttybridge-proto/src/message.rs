//! Typed views over frames.
//!
//! [`ServerMessage`] is what the client receives, [`ClientMessage`] is what it
//! sends. Both convert to and from raw wire bytes so that either end of the
//! protocol can be simulated in tests.

use bytes::Bytes;

use crate::{
    ClientCommand, Frame, ServerCommand,
    errors::{ProtocolError, Result},
    payloads::{AuthRequest, Preferences, ReconnectPolicy, WindowSize},
};

/// First byte of the bare JSON auth handshake.
const JSON_OBJECT_START: u8 = b'{';

/// Decoded server-to-client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Terminal output bytes (may embed a transfer session).
    Output(Bytes),
    /// New window title.
    SetWindowTitle(String),
    /// Render-widget options to apply.
    SetPreferences(Preferences),
    /// New auto-reconnect policy.
    SetReconnect(ReconnectPolicy),
    /// Command this client does not understand. Ignored by the receiver so
    /// servers can introduce new commands.
    Unknown {
        /// Raw command byte.
        command: u8,
    },
}

impl ServerMessage {
    /// Interpret a frame received from the server.
    ///
    /// Unknown command bytes decode to [`ServerMessage::Unknown`] rather than
    /// an error. Titles decode lossily, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidJson` if a preferences or reconnect payload
    ///   is not valid JSON of the expected shape
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let Some(command) = frame.server_command() else {
            return Ok(Self::Unknown { command: frame.command });
        };

        match command {
            ServerCommand::Output => Ok(Self::Output(frame.payload.clone())),
            ServerCommand::SetWindowTitle => {
                Ok(Self::SetWindowTitle(String::from_utf8_lossy(&frame.payload).into_owned()))
            },
            ServerCommand::SetPreferences => serde_json::from_slice::<Preferences>(&frame.payload)
                .map(Self::SetPreferences)
                .map_err(|e| invalid_json(command, &e)),
            ServerCommand::SetReconnect => serde_json::from_slice::<f64>(&frame.payload)
                .map(|secs| Self::SetReconnect(ReconnectPolicy::from_secs(secs)))
                .map_err(|e| invalid_json(command, &e)),
        }
    }

    /// Decode one complete transport message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyMessage` for a zero-length message
    /// - `ProtocolError::InvalidJson` as for [`ServerMessage::from_frame`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_frame(&Frame::decode(bytes)?)
    }

    /// Encode as a server would send it.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if preferences fail to serialize
    pub fn into_frame(self) -> Result<Frame> {
        match self {
            Self::Output(bytes) => Ok(Frame::server(ServerCommand::Output, bytes)),
            Self::SetWindowTitle(title) => {
                Ok(Frame::server(ServerCommand::SetWindowTitle, title.into_bytes()))
            },
            Self::SetPreferences(prefs) => {
                let json = serde_json::to_vec(&prefs)
                    .map_err(|e| ProtocolError::JsonEncode(e.to_string()))?;
                Ok(Frame::server(ServerCommand::SetPreferences, json))
            },
            Self::SetReconnect(policy) => {
                let secs = policy.interval().map_or(-1.0, |d| d.as_secs_f64());
                Ok(Frame::server(ServerCommand::SetReconnect, secs.to_string().into_bytes()))
            },
            Self::Unknown { command } => Ok(Frame::new(command, Bytes::new())),
        }
    }
}

/// Client-to-server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Keystrokes or transfer-protocol bytes.
    Input(Bytes),
    /// Terminal size announcement.
    Resize(WindowSize),
    /// Authentication handshake, sent untagged as raw JSON.
    Auth(AuthRequest),
}

impl ClientMessage {
    /// Encode to wire bytes.
    ///
    /// `Input` and `Resize` become command-tagged frames; `Auth` is the bare
    /// JSON object.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if a JSON payload fails to serialize
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Self::Input(bytes) => Ok(Frame::client(ClientCommand::Input, bytes.clone()).to_bytes()),
            Self::Resize(size) => {
                let json =
                    serde_json::to_vec(size).map_err(|e| ProtocolError::JsonEncode(e.to_string()))?;
                Ok(Frame::client(ClientCommand::ResizeTerminal, json).to_bytes())
            },
            Self::Auth(auth) => serde_json::to_vec(auth)
                .map(Bytes::from)
                .map_err(|e| ProtocolError::JsonEncode(e.to_string())),
        }
    }

    /// Decode wire bytes as the server would.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyMessage` for a zero-length message
    /// - `ProtocolError::UnknownCommand` if the first byte is neither a client
    ///   command nor the start of a JSON object
    /// - `ProtocolError::InvalidJson` for malformed resize or auth payloads
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame = Frame::decode(bytes)?;

        if frame.command == JSON_OBJECT_START {
            return serde_json::from_slice(bytes).map(Self::Auth).map_err(|e| {
                ProtocolError::InvalidJson { command: '{', reason: e.to_string() }
            });
        }

        match frame.client_command() {
            Some(ClientCommand::Input) => Ok(Self::Input(frame.payload)),
            Some(ClientCommand::ResizeTerminal) => serde_json::from_slice(&frame.payload)
                .map(Self::Resize)
                .map_err(|e| ProtocolError::InvalidJson {
                    command: char::from(frame.command),
                    reason: e.to_string(),
                }),
            None => Err(ProtocolError::UnknownCommand(frame.command)),
        }
    }
}

fn invalid_json(command: ServerCommand, err: &serde_json::Error) -> ProtocolError {
    ProtocolError::InvalidJson { command: char::from(command.to_u8()), reason: err.to_string() }
}
