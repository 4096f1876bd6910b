//! Protocol-to-terminal translation layer.
//!
//! The [`Bridge`] owns the [`ConnectionManager`] and the [`TransferAdapter`]
//! and adapts them to the terminal surface.
//!
//! # Responsibilities
//!
//! - Decodes server messages and dispatches them by command.
//! - Routes terminal output through the transfer adapter before rendering.
//! - Encodes outgoing client messages into wire bytes for the driver.
//! - Keeps local input disabled exactly while a transfer session is active or
//!   a blocking dialog is shown.
//! - Composes window titles from the terminal and the server.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use ttybridge_core::{
    ConnectionAction, ConnectionConfig, ConnectionError, ConnectionManager, ConnectionNotice,
    Sentry, Session, TransferAction, TransferAdapter, TransferPhase,
};
use ttybridge_proto::{ClientMessage, Preferences, ServerMessage};

use crate::{BridgeAction, BridgeEvent, Dialog, UiAction};

/// Overlay shown when the transfer codec declines a session.
pub const TRANSFER_REJECTED_MESSAGE: &str = "File transfer not supported";

const TRANSFER_REJECTED_FLASH: Duration = Duration::from_secs(2);

/// Bridge between the terminal and the protocol state machines.
///
/// Generic over the instant type (real or virtual time) and the transfer
/// sentry.
pub struct Bridge<I, S>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    connection: ConnectionManager<I>,
    transfer: TransferAdapter<S>,
    dialog: Option<Dialog>,
    input_enabled: bool,
}

impl<I, S> Bridge<I, S>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
    S: Sentry,
{
    /// Create a bridge with input enabled and nothing connected.
    pub fn new(session: Session, config: ConnectionConfig, sentry: S) -> Self {
        Self {
            connection: ConnectionManager::new(session, config),
            transfer: TransferAdapter::new(sentry),
            dialog: None,
            input_enabled: true,
        }
    }

    /// Connection state machine.
    pub fn connection(&self) -> &ConnectionManager<I> {
        &self.connection
    }

    /// Mutable connection state machine, for seeding the window size.
    pub fn connection_mut(&mut self) -> &mut ConnectionManager<I> {
        &mut self.connection
    }

    /// Transfer adapter.
    pub fn transfer(&self) -> &TransferAdapter<S> {
        &self.transfer
    }

    /// Dialog currently shown.
    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    /// Whether local keystrokes are forwarded.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Earliest instant at which a [`BridgeEvent::Tick`] has work to do.
    pub fn next_deadline(&self) -> Option<I> {
        self.connection.next_deadline()
    }

    /// Process one event.
    pub fn handle(&mut self, event: BridgeEvent, now: I) -> Vec<BridgeAction> {
        let mut out = Vec::new();

        match event {
            BridgeEvent::Connect => {
                let actions = self.connection.connect();
                self.apply_connection(actions, &mut out);
            },
            BridgeEvent::Disconnect => {
                let actions = self.connection.disconnect();
                self.apply_connection(actions, &mut out);
            },
            BridgeEvent::ConfigFetched(result) => {
                let result = self.connection.handle_config(result);
                self.apply_result(result, &mut out);
            },
            BridgeEvent::TransportOpened { transport } => {
                let result = self.connection.handle_open(transport);
                self.apply_result(result, &mut out);
            },
            BridgeEvent::TransportMessage { transport, data } => {
                if self.connection.is_current(transport) {
                    self.handle_message(&data, &mut out);
                } else {
                    tracing::debug!(%transport, len = data.len(), "dropping message from stale transport");
                }
            },
            BridgeEvent::TransportClosed { transport, code } => {
                let result = self.connection.handle_close(transport, code, now);
                self.end_transfer_on_close(&result, &mut out);
                self.apply_result(result, &mut out);
            },
            BridgeEvent::TransportFailed { transport, reason } => {
                let result = self.connection.handle_error(
                    transport,
                    &ConnectionError::Transport(reason),
                    now,
                );
                self.end_transfer_on_close(&result, &mut out);
                self.apply_result(result, &mut out);
            },
            BridgeEvent::UserInput(bytes) => {
                if self.input_enabled {
                    let action = self.connection.send(ClientMessage::Input(bytes));
                    self.apply_connection(action, &mut out);
                } else {
                    tracing::trace!(len = bytes.len(), "input disabled, dropping keystrokes");
                }
            },
            BridgeEvent::Resize(size) => self.connection.request_resize(size, now),
            BridgeEvent::TerminalTitle(title) => {
                let title = self.connection.session().compose_title(&title);
                out.push(BridgeAction::Ui(UiAction::SetTitle(title)));
            },
            BridgeEvent::SkipTransfer => {
                let actions = self.transfer.skip();
                self.apply_transfer(actions, &mut out);
            },
            BridgeEvent::FilesSelected(files) => {
                let actions = self.transfer.select_files(&files);
                self.apply_transfer(actions, &mut out);
            },
            BridgeEvent::Tick => {
                let actions = self.connection.tick(now);
                self.apply_connection(actions, &mut out);
            },
            BridgeEvent::Quit => {
                out.extend(self.dispose());
                out.push(BridgeAction::Quit);
            },
        }

        self.sync_input(&mut out);
        out
    }

    /// Tear down the transport, the transfer session and any dialog.
    ///
    /// No reconnect is attempted afterwards.
    pub fn dispose(&mut self) -> Vec<BridgeAction> {
        let mut out = Vec::new();
        let actions = self.transfer.abort("disposed");
        self.apply_transfer(actions, &mut out);
        let actions = self.connection.dispose();
        self.apply_connection(actions, &mut out);
        if self.dialog.take().is_some() {
            out.push(BridgeAction::Ui(UiAction::HideDialog));
        }
        self.sync_input(&mut out);
        out
    }

    fn handle_message(&mut self, data: &[u8], out: &mut Vec<BridgeAction>) {
        let message = match ServerMessage::decode(data) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%err, "dropping malformed server message");
                return;
            },
        };

        match message {
            ServerMessage::Output(bytes) => {
                let actions = self.transfer.consume(&bytes);
                self.apply_transfer(actions, out);
            },
            ServerMessage::SetWindowTitle(title) => {
                self.connection.session_mut().set_title(title.clone());
                out.push(BridgeAction::Ui(UiAction::SetTitle(title)));
            },
            ServerMessage::SetPreferences(preferences) => apply_preferences(preferences, out),
            ServerMessage::SetReconnect(policy) => self.connection.set_reconnect(policy),
            ServerMessage::Unknown { command } => {
                tracing::warn!(command = %char::from(command), "ignoring unknown server command");
            },
        }
    }

    fn end_transfer_on_close<T>(
        &mut self,
        result: &Result<T, ConnectionError>,
        out: &mut Vec<BridgeAction>,
    ) {
        if result.is_ok() {
            let actions = self.transfer.abort("connection closed");
            self.apply_transfer(actions, out);
        }
    }

    fn apply_result(
        &mut self,
        result: Result<Vec<ConnectionAction>, ConnectionError>,
        out: &mut Vec<BridgeAction>,
    ) {
        match result {
            Ok(actions) => self.apply_connection(actions, out),
            Err(err @ ConnectionError::StaleTransport { .. }) => {
                tracing::debug!(%err, "ignoring event");
            },
            Err(err) => tracing::warn!(%err, "connection event rejected"),
        }
    }

    fn apply_connection(
        &mut self,
        actions: impl IntoIterator<Item = ConnectionAction>,
        out: &mut Vec<BridgeAction>,
    ) {
        for action in actions {
            match action {
                ConnectionAction::FetchConfig => out.push(BridgeAction::FetchConfig),
                ConnectionAction::OpenTransport { transport, socket_path } => {
                    out.push(BridgeAction::OpenTransport { transport, socket_path });
                },
                ConnectionAction::Send { transport, message } => match message.encode() {
                    Ok(data) => out.push(BridgeAction::Send { transport, data }),
                    Err(err) => tracing::warn!(%err, "failed to encode client message"),
                },
                ConnectionAction::CloseTransport { transport } => {
                    out.push(BridgeAction::CloseTransport { transport });
                },
                ConnectionAction::WatchWindow(enabled) => {
                    out.push(BridgeAction::Ui(UiAction::WatchWindow(enabled)));
                },
                ConnectionAction::Notify(ConnectionNotice::Flash { text, duration }) => {
                    out.push(BridgeAction::Ui(UiAction::ShowTransientMessage { text, duration }));
                },
                ConnectionAction::Notify(ConnectionNotice::Dialog { message, is_error }) => {
                    self.show_dialog(Dialog::Notice { message, is_error }, out);
                },
                ConnectionAction::Notify(ConnectionNotice::HideDialog) => {
                    if self.dialog.take().is_some() {
                        out.push(BridgeAction::Ui(UiAction::HideDialog));
                    }
                },
            }
        }
    }

    fn apply_transfer(&mut self, actions: Vec<TransferAction>, out: &mut Vec<BridgeAction>) {
        for action in actions {
            match action {
                TransferAction::Render(bytes) => {
                    out.push(BridgeAction::Ui(UiAction::RenderBytes(bytes)));
                },
                TransferAction::Send(frame) => {
                    let action = self.connection.send(ClientMessage::Input(frame.payload));
                    self.apply_connection(action, out);
                },
                TransferAction::Started(direction) => {
                    tracing::debug!(?direction, "terminal input suspended for transfer");
                },
                TransferAction::OfferReceived(details) => {
                    self.show_dialog(Dialog::ReceiveFile(details), out);
                },
                TransferAction::RequestFiles => self.show_dialog(Dialog::SendFiles, out),
                TransferAction::FileInfo(details) => {
                    out.push(BridgeAction::Ui(UiAction::ShowFileInfo(details)));
                },
                TransferAction::Progress(progress) => {
                    out.push(BridgeAction::Ui(UiAction::ShowTransferProgress(progress)));
                },
                TransferAction::SaveFile { name, data } => {
                    out.push(BridgeAction::Ui(UiAction::SaveFile { name, data }));
                },
                TransferAction::Ended(phase) => {
                    self.hide_transfer_dialog(out);
                    if phase == TransferPhase::Rejected {
                        out.push(BridgeAction::Ui(UiAction::ShowTransientMessage {
                            text: TRANSFER_REJECTED_MESSAGE.to_string(),
                            duration: Some(TRANSFER_REJECTED_FLASH),
                        }));
                    }
                },
                TransferAction::Aborted { .. } => self.hide_transfer_dialog(out),
            }
        }
    }

    fn show_dialog(&mut self, dialog: Dialog, out: &mut Vec<BridgeAction>) {
        self.dialog = Some(dialog.clone());
        out.push(BridgeAction::Ui(UiAction::ShowDialog(dialog)));
    }

    fn hide_transfer_dialog(&mut self, out: &mut Vec<BridgeAction>) {
        if self.dialog.as_ref().is_some_and(Dialog::is_transfer) {
            self.dialog = None;
            out.push(BridgeAction::Ui(UiAction::HideDialog));
        }
    }

    fn sync_input(&mut self, out: &mut Vec<BridgeAction>) {
        let enabled = !self.transfer.is_active() && self.dialog.is_none();
        if enabled != self.input_enabled {
            self.input_enabled = enabled;
            out.push(BridgeAction::Ui(UiAction::SetInputEnabled(enabled)));
        }
    }
}

fn apply_preferences(preferences: Preferences, out: &mut Vec<BridgeAction>) {
    for (name, value) in preferences.0 {
        tracing::info!(%name, %value, "setting terminal option");
        out.push(BridgeAction::Ui(UiAction::SetOption { name, value }));
    }
}
