//! Bridge input events.
//!
//! Events originate from three sources:
//! - User interactions (keystrokes, resize, dialog choices) and timer ticks.
//! - The bootstrap request.
//! - Transport notifications, tagged with the transport they belong to.

use bytes::Bytes;
use ttybridge_core::{BootstrapError, OutgoingFile, TransportId};
use ttybridge_proto::{ServerConfig, WindowSize};

/// Events processed by the [`Bridge`](crate::Bridge).
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// Start a connection, or reconnect from the close dialog.
    Connect,

    /// Close the connection locally.
    Disconnect,

    /// Bootstrap request finished.
    ConfigFetched(Result<ServerConfig, BootstrapError>),

    /// Transport completed its opening handshake.
    TransportOpened {
        /// Transport id
        transport: TransportId,
    },

    /// One complete message arrived.
    TransportMessage {
        /// Transport id
        transport: TransportId,
        /// Message bytes, command byte first
        data: Bytes,
    },

    /// Transport closed. `code` is the WebSocket close code, if any.
    TransportClosed {
        /// Transport id
        transport: TransportId,
        /// Close code
        code: Option<u16>,
    },

    /// Transport failed without a close handshake.
    TransportFailed {
        /// Transport id
        transport: TransportId,
        /// Diagnostic
        reason: String,
    },

    /// Keystrokes from the user.
    UserInput(Bytes),

    /// Terminal dimensions changed.
    Resize(WindowSize),

    /// Title set by the program running in the terminal.
    TerminalTitle(String),

    /// User skipped the offered file.
    SkipTransfer,

    /// User picked files to upload. Empty means cancel.
    FilesSelected(Vec<OutgoingFile>),

    /// Timer tick.
    Tick,

    /// Shut down.
    Quit,
}
