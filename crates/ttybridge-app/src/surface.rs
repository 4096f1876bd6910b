//! Terminal surface abstraction.
//!
//! Everything the bridge needs from the UI: rendering output, overlays,
//! dialogs, the title and transfer feedback. User-originated events flow the
//! other way, through [`Driver::poll_event`](crate::Driver::poll_event).

use std::time::Duration;

use serde_json::Value;
use ttybridge_core::{FileDetails, TransferProgress};

/// A blocking dialog. Local input is disabled while one is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    /// Connection ended or failed to start.
    Notice {
        /// Text to show
        message: String,
        /// Render as an error
        is_error: bool,
    },
    /// Remote side offers a file.
    ReceiveFile(FileDetails),
    /// Remote side wants files.
    SendFiles,
}

/// Buttons offered by a [`Dialog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogChoice {
    /// Open a new connection
    Reconnect,
    /// Decline the offered file
    Skip,
    /// Upload the selected files
    Send,
    /// Upload nothing
    Cancel,
}

impl DialogChoice {
    /// Short button text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Reconnect => "reconnect",
            Self::Skip => "skip",
            Self::Send => "send",
            Self::Cancel => "cancel",
        }
    }
}

impl Dialog {
    /// Choices the user can make.
    #[must_use]
    pub fn choices(&self) -> &'static [DialogChoice] {
        match self {
            Self::Notice { .. } => &[DialogChoice::Reconnect],
            Self::ReceiveFile(_) => &[DialogChoice::Skip],
            Self::SendFiles => &[DialogChoice::Send, DialogChoice::Cancel],
        }
    }

    /// Whether this dialog belongs to a transfer session.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::ReceiveFile(_) | Self::SendFiles)
    }
}

/// Format a byte count with binary units.
///
/// Zero is rendered as a bare `0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_bytes(bytes: u64, precision: usize) -> String {
    const UNITS: [&str; 6] = ["bytes", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.precision$} {}", UNITS[unit])
}

/// Multi-line summary of a file in transfer.
#[must_use]
pub fn describe_file(details: &FileDetails) -> String {
    format!(
        "Files remaining: {}\nBytes remaining: {}\n\nFilename: {}",
        details.files_remaining,
        human_bytes(details.bytes_remaining, 2),
        details.name
    )
}

/// UI operations provided by a frontend.
///
/// Methods are infallible; implementations log their own rendering failures
/// and report fatal ones from [`Driver::flush`](crate::Driver::flush).
pub trait Surface {
    /// Overlay text, hidden after `duration` or left up when `None`.
    fn show_transient_message(&mut self, text: &str, duration: Option<Duration>);

    /// Show a blocking dialog, replacing any other.
    fn show_dialog(&mut self, dialog: &Dialog);

    /// Remove the blocking dialog.
    fn hide_dialog(&mut self);

    /// Allow or block local keystrokes.
    fn set_input_enabled(&mut self, enabled: bool);

    /// Write terminal output.
    fn render_bytes(&mut self, bytes: &[u8]);

    /// Set the window title.
    fn set_title(&mut self, title: &str);

    /// Apply a terminal preference pushed by the server.
    fn set_option(&mut self, name: &str, value: &Value);

    /// Show details of the file being transferred.
    fn show_file_info(&mut self, details: &FileDetails);

    /// Update the progress indicator.
    fn show_transfer_progress(&mut self, progress: TransferProgress);

    /// Hand a received file to the user.
    fn save_file(&mut self, name: &str, data: &[u8]);

    /// Start or stop reporting resizes and unload.
    fn watch_window(&mut self, enabled: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(0, 2), "0");
        assert_eq!(human_bytes(512, 2), "512.00 bytes");
        assert_eq!(human_bytes(1536, 2), "1.50 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024, 1), "5.0 MB");
    }

    #[test]
    fn file_description() {
        let details =
            FileDetails { name: "a.bin".into(), size: 2048, files_remaining: 2, bytes_remaining: 3072 };
        assert_eq!(
            describe_file(&details),
            "Files remaining: 2\nBytes remaining: 3.00 KB\n\nFilename: a.bin"
        );
    }

    #[test]
    fn dialog_choices() {
        assert_eq!(
            Dialog::Notice { message: "Closed".into(), is_error: false }.choices(),
            &[DialogChoice::Reconnect]
        );
        assert_eq!(Dialog::SendFiles.choices(), &[DialogChoice::Send, DialogChoice::Cancel]);
        assert_eq!(DialogChoice::Reconnect.label(), "reconnect");
        assert!(!Dialog::Notice { message: String::new(), is_error: true }.is_transfer());
    }
}
