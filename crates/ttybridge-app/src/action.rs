//! Bridge output actions.

use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use ttybridge_core::{FileDetails, TransferProgress, TransportId};

use crate::{Dialog, Surface};

/// UI updates produced by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    /// Overlay text.
    ShowTransientMessage {
        /// Text to show
        text: String,
        /// Auto-hide delay. `None` stays until replaced.
        duration: Option<Duration>,
    },
    /// Show a blocking dialog.
    ShowDialog(Dialog),
    /// Remove the blocking dialog.
    HideDialog,
    /// Allow or block local keystrokes.
    SetInputEnabled(bool),
    /// Terminal output.
    RenderBytes(Bytes),
    /// Window title.
    SetTitle(String),
    /// Terminal preference.
    SetOption {
        /// Option name
        name: String,
        /// Option value
        value: Value,
    },
    /// File being transferred.
    ShowFileInfo(FileDetails),
    /// Transfer progress.
    ShowTransferProgress(TransferProgress),
    /// Received file ready to save.
    SaveFile {
        /// File name
        name: String,
        /// Contents
        data: Bytes,
    },
    /// Start or stop window observers.
    WatchWindow(bool),
}

impl UiAction {
    /// Perform this update on `surface`.
    pub fn apply<S: Surface + ?Sized>(self, surface: &mut S) {
        match self {
            Self::ShowTransientMessage { text, duration } => {
                surface.show_transient_message(&text, duration);
            },
            Self::ShowDialog(dialog) => surface.show_dialog(&dialog),
            Self::HideDialog => surface.hide_dialog(),
            Self::SetInputEnabled(enabled) => surface.set_input_enabled(enabled),
            Self::RenderBytes(bytes) => surface.render_bytes(&bytes),
            Self::SetTitle(title) => surface.set_title(&title),
            Self::SetOption { name, value } => surface.set_option(&name, &value),
            Self::ShowFileInfo(details) => surface.show_file_info(&details),
            Self::ShowTransferProgress(progress) => surface.show_transfer_progress(progress),
            Self::SaveFile { name, data } => surface.save_file(&name, &data),
            Self::WatchWindow(enabled) => surface.watch_window(enabled),
        }
    }
}

/// Actions the runtime executes on behalf of the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    /// Start the bootstrap configuration request.
    FetchConfig,
    /// Open a transport.
    OpenTransport {
        /// Id to tag the transport's events with
        transport: TransportId,
        /// Path relative to the service root
        socket_path: String,
    },
    /// Send encoded bytes as one message.
    Send {
        /// Target transport
        transport: TransportId,
        /// Wire bytes
        data: Bytes,
    },
    /// Close a transport.
    CloseTransport {
        /// Transport to close
        transport: TransportId,
    },
    /// Update the UI.
    Ui(UiAction),
    /// Stop the runtime.
    Quit,
}
