//! Command tags.
//!
//! The first byte of every frame selects how the payload is interpreted. The
//! same digit means different things per direction, so each direction gets
//! its own enum.

/// Commands sent from client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientCommand {
    /// Keystrokes or embedded transfer-protocol bytes.
    Input = b'0',
    /// Terminal dimensions as JSON `{columns, rows}`.
    ResizeTerminal = b'1',
}

impl ClientCommand {
    /// Wire value of this command.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value. `None` if the byte is not a client command.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Self::Input),
            b'1' => Some(Self::ResizeTerminal),
            _ => None,
        }
    }
}

/// Commands sent from server to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerCommand {
    /// Terminal output, possibly carrying an embedded transfer session.
    Output = b'0',
    /// Window title as UTF-8 text.
    SetWindowTitle = b'1',
    /// Render-widget options as a JSON object.
    SetPreferences = b'2',
    /// Auto-reconnect interval in seconds as a JSON number.
    SetReconnect = b'3',
}

impl ServerCommand {
    /// Wire value of this command.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value. `None` for commands this client does not know.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Self::Output),
            b'1' => Some(Self::SetWindowTitle),
            b'2' => Some(Self::SetPreferences),
            b'3' => Some(Self::SetReconnect),
            _ => None,
        }
    }
}
