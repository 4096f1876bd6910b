//! Terminal driver.
//!
//! Implements the [`Driver`] trait for a local tty: crossterm for raw-mode
//! keyboard input and output, reqwest for the configuration bootstrap and
//! tokio-tungstenite for the transport. Remote output is written straight to
//! stdout; overlays and dialogs are drawn on the bottom line.

use std::{
    collections::HashMap,
    io::{self, Stdout, Write, stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use bytes::Bytes;
use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType, SetTitle, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use ttybridge_app::{BridgeEvent, Dialog, DialogChoice, Driver, Surface, describe_file};
use ttybridge_core::{Environment, FileDetails, OutgoingFile, TransferProgress, TransportId};
use ttybridge_proto::WindowSize;

use crate::{
    Endpoints, SystemEnv, bootstrap,
    keys::{self, KeyInput},
    transport::{self, TransportHandle},
};

/// Shown when the escape key is pressed while connected.
const QUIT_CONFIRMATION: &str = "Are you sure? Press Ctrl-] again to quit";

const NOTICE_FLASH: Duration = Duration::from_secs(2);

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from terminal operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Text for the bottom line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusText {
    /// Line content
    pub text: String,
    /// Render as an error
    pub is_error: bool,
}

/// Overlay and dialog state drawn on the bottom line.
#[derive(Debug, Default)]
pub struct StatusLine {
    flash: Option<(String, Option<Instant>)>,
    dialog: Option<Dialog>,
    prompt: String,
    file: Option<String>,
    progress: Option<String>,
}

impl StatusLine {
    /// Show `text` until `expires`, or until replaced.
    pub fn flash(&mut self, text: &str, expires: Option<Instant>) {
        self.flash = Some((text.to_string(), expires));
    }

    /// Drop the flash if it expired. Returns whether anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.flash_deadline().is_some_and(|at| at <= now) {
            self.flash = None;
            return true;
        }
        false
    }

    /// When the current flash should disappear.
    pub fn flash_deadline(&self) -> Option<Instant> {
        self.flash.as_ref().and_then(|(_, expires)| *expires)
    }

    /// Show a dialog, replacing any other.
    pub fn show_dialog(&mut self, dialog: &Dialog) {
        self.dialog = Some(dialog.clone());
        self.prompt.clear();
        self.file = None;
        self.progress = None;
    }

    /// Remove the dialog and its transfer details.
    pub fn hide_dialog(&mut self) {
        self.dialog = None;
        self.prompt.clear();
        self.file = None;
        self.progress = None;
    }

    /// Dialog currently shown.
    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    /// File-path entry for the send dialog.
    pub fn prompt_mut(&mut self) -> &mut String {
        &mut self.prompt
    }

    /// Record the file in transfer.
    pub fn set_file(&mut self, details: &FileDetails) {
        let summary: Vec<_> = describe_file(details).lines().filter(|l| !l.is_empty()).map(str::to_string).collect();
        self.file = Some(summary.join(" | "));
    }

    /// Record transfer progress.
    pub fn set_progress(&mut self, progress: TransferProgress) {
        self.progress = Some(format!("{progress}%"));
    }

    /// What the bottom line should show, flash first.
    pub fn text(&self) -> Option<StatusText> {
        if let Some((text, _)) = &self.flash {
            return Some(StatusText { text: text.clone(), is_error: false });
        }

        let dialog = self.dialog.as_ref()?;
        let details = [self.file.as_deref(), self.progress.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let hints = dialog
            .choices()
            .iter()
            .map(|&choice| format!("[{}] {}", key_name(choice_key(choice)), choice.label()))
            .collect::<Vec<_>>()
            .join("  ");
        let (text, is_error) = match dialog {
            Dialog::Notice { message, is_error } => {
                (format!("{message}  {hints}  [Ctrl-]] quit"), *is_error)
            },
            Dialog::ReceiveFile(offer) if details.is_empty() => {
                (format!("Receiving {}  {hints}", offer.name), false)
            },
            Dialog::ReceiveFile(_) => (format!("{details}  {hints}"), false),
            Dialog::SendFiles if details.is_empty() => {
                (format!("Send files: {}_  {hints}", self.prompt), false)
            },
            Dialog::SendFiles => (details, false),
        };
        Some(StatusText { text, is_error })
    }
}

/// Terminal driver implementing the [`Driver`] trait.
///
/// Owns the tty in raw mode for its whole lifetime and every transport task
/// it started.
pub struct TerminalDriver {
    stdout: Stdout,
    keys: EventStream,
    network_tx: mpsc::UnboundedSender<BridgeEvent>,
    network_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    http: reqwest::Client,
    endpoints: Endpoints,
    transports: HashMap<TransportId, TransportHandle>,
    env: SystemEnv,
    size: WindowSize,
    status: StatusLine,
    status_drawn: bool,
    download_dir: PathBuf,
    pending_error: Option<io::Error>,
    input_enabled: bool,
    watching: bool,
    quit_armed: bool,
}

impl TerminalDriver {
    /// Put the tty in raw mode and prepare the network clients.
    pub fn new(endpoints: Endpoints, download_dir: PathBuf) -> Result<Self, TerminalError> {
        let http = reqwest::Client::builder().build()?;
        let (columns, rows) = terminal::size()?;
        enable_raw_mode()?;

        let (network_tx, network_rx) = mpsc::unbounded_channel();
        Ok(Self {
            stdout: stdout(),
            keys: EventStream::new(),
            network_tx,
            network_rx,
            http,
            endpoints,
            transports: HashMap::new(),
            env: SystemEnv::new(),
            size: WindowSize::new(columns, rows),
            status: StatusLine::default(),
            status_drawn: false,
            download_dir,
            pending_error: None,
            input_enabled: true,
            watching: false,
            quit_armed: false,
        })
    }

    /// Current tty dimensions.
    pub fn window_size(&self) -> WindowSize {
        self.size
    }

    fn defer(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            tracing::warn!(%err, "terminal write failed");
            self.pending_error.get_or_insert(err);
        }
    }

    fn draw_status(&mut self) {
        let text = self.status.text();
        if text.is_none() && !self.status_drawn {
            return;
        }
        let result = self.queue_status(text.as_ref());
        self.status_drawn = text.is_some();
        self.defer(result);
    }

    fn queue_status(&mut self, status: Option<&StatusText>) -> io::Result<()> {
        let row = self.size.rows.saturating_sub(1);
        queue!(self.stdout, SavePosition, MoveTo(0, row), Clear(ClearType::CurrentLine))?;
        if let Some(status) = status {
            let text: String = status.text.chars().take(usize::from(self.size.columns)).collect();
            let color = if status.is_error { Color::Red } else { Color::Yellow };
            queue!(
                self.stdout,
                SetAttribute(Attribute::Reverse),
                SetForegroundColor(color),
                Print(text),
                ResetColor,
                SetAttribute(Attribute::Reset),
            )?;
        }
        queue!(self.stdout, RestorePosition)
    }

    fn flash(&mut self, text: &str, duration: Option<Duration>) {
        let expires = duration.map(|duration| self.env.now() + duration);
        self.status.flash(text, expires);
        self.draw_status();
    }

    /// Drop handles of transports whose task has ended.
    fn forget_finished(&mut self, event: &BridgeEvent) {
        if let BridgeEvent::TransportClosed { transport, .. }
        | BridgeEvent::TransportFailed { transport, .. } = event
        {
            self.transports.remove(transport);
        }
    }

    async fn handle_terminal_event(&mut self, event: Event) -> Option<BridgeEvent> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key).await,
            Event::Resize(columns, rows) => {
                self.size = WindowSize::new(columns, rows);
                self.draw_status();
                Some(BridgeEvent::Resize(self.size))
            },
            Event::Paste(text) => {
                if matches!(self.status.dialog(), Some(Dialog::SendFiles)) {
                    self.status.prompt_mut().push_str(&text);
                    self.draw_status();
                    None
                } else {
                    Some(BridgeEvent::UserInput(Bytes::from(text.into_bytes())))
                }
            },
            _ => None,
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> Option<BridgeEvent> {
        let input = keys::encode(&key)?;
        if input == KeyInput::Escape {
            return self.request_quit();
        }
        self.quit_armed = false;

        let Some(dialog) = self.status.dialog() else {
            return match input {
                KeyInput::Bytes(bytes) if self.input_enabled => {
                    Some(BridgeEvent::UserInput(Bytes::from(bytes)))
                },
                KeyInput::Bytes(_) | KeyInput::Escape => None,
            };
        };

        let choice = pick(dialog, key.code);
        let editing = matches!(dialog, Dialog::SendFiles);
        match choice {
            Some(choice) => self.choose(choice).await,
            None if editing => {
                self.edit_prompt(key);
                None
            },
            None => None,
        }
    }

    async fn choose(&mut self, choice: DialogChoice) -> Option<BridgeEvent> {
        match choice {
            DialogChoice::Reconnect => Some(BridgeEvent::Connect),
            DialogChoice::Skip => Some(BridgeEvent::SkipTransfer),
            DialogChoice::Cancel => Some(BridgeEvent::FilesSelected(Vec::new())),
            DialogChoice::Send => {
                let paths = self.status.prompt_mut().clone();
                match read_files(&paths).await {
                    Ok(files) => Some(BridgeEvent::FilesSelected(files)),
                    Err(err) => {
                        tracing::warn!(%err, "cannot read selected files");
                        self.flash(&err.to_string(), Some(NOTICE_FLASH));
                        None
                    },
                }
            },
        }
    }

    fn request_quit(&mut self) -> Option<BridgeEvent> {
        if self.watching && !self.quit_armed {
            self.quit_armed = true;
            self.flash(QUIT_CONFIRMATION, Some(NOTICE_FLASH));
            return None;
        }
        Some(BridgeEvent::Quit)
    }

    fn edit_prompt(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Backspace => {
                self.status.prompt_mut().pop();
            },
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.status.prompt_mut().push(c);
            },
            _ => {},
        }
        self.draw_status();
    }
}

/// Key that picks `choice` in a dialog.
fn choice_key(choice: DialogChoice) -> KeyCode {
    match choice {
        DialogChoice::Reconnect => KeyCode::Char('r'),
        DialogChoice::Skip => KeyCode::Char('s'),
        DialogChoice::Send => KeyCode::Enter,
        DialogChoice::Cancel => KeyCode::Esc,
    }
}

/// Choice of `dialog` bound to `code`, ignoring letter case.
fn pick(dialog: &Dialog, code: KeyCode) -> Option<DialogChoice> {
    let code = match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    };
    dialog.choices().iter().copied().find(|&choice| choice_key(choice) == code)
}

fn key_name(code: KeyCode) -> String {
    match code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        other => format!("{other:?}"),
    }
}

/// Load whitespace-separated `paths` for upload.
async fn read_files(paths: &str) -> io::Result<Vec<OutgoingFile>> {
    let mut files = Vec::new();
    for path in paths.split_whitespace() {
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| io::Error::new(err.kind(), format!("{path}: {err}")))?;
        let name = Path::new(path)
            .file_name()
            .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned());
        files.push(OutgoingFile { name, data: Bytes::from(data) });
    }
    Ok(files)
}

/// Last path component of a remote-supplied name, so files land in the
/// download directory.
fn local_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).find(|part| !part.is_empty() && *part != "..").unwrap_or("download")
}

enum Wake {
    Network(BridgeEvent),
    Terminal(Option<io::Result<Event>>),
    Timer,
}

impl Surface for TerminalDriver {
    fn show_transient_message(&mut self, text: &str, duration: Option<Duration>) {
        self.flash(text, duration);
    }

    fn show_dialog(&mut self, dialog: &Dialog) {
        self.status.show_dialog(dialog);
        self.draw_status();
    }

    fn hide_dialog(&mut self) {
        self.status.hide_dialog();
        self.draw_status();
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        tracing::debug!(enabled, "local input");
        self.input_enabled = enabled;
    }

    fn render_bytes(&mut self, bytes: &[u8]) {
        let result = self.stdout.write_all(bytes);
        self.defer(result);
        if self.status_drawn {
            self.draw_status();
        }
    }

    fn set_title(&mut self, title: &str) {
        let result = queue!(self.stdout, SetTitle(title));
        self.defer(result);
    }

    fn set_option(&mut self, name: &str, value: &serde_json::Value) {
        tracing::debug!(%name, %value, "terminal option has no local equivalent");
    }

    fn show_file_info(&mut self, details: &FileDetails) {
        self.status.set_file(details);
        self.draw_status();
    }

    fn show_transfer_progress(&mut self, progress: TransferProgress) {
        self.status.set_progress(progress);
        self.draw_status();
    }

    fn save_file(&mut self, name: &str, data: &[u8]) {
        let path = self.download_dir.join(local_name(name));
        match std::fs::write(&path, data) {
            Ok(()) => {
                tracing::info!(path = %path.display(), len = data.len(), "file saved");
                self.flash(&format!("Saved {}", path.display()), Some(NOTICE_FLASH));
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cannot save file");
                self.flash(&format!("Cannot save {}: {err}", path.display()), Some(NOTICE_FLASH));
            },
        }
    }

    fn watch_window(&mut self, enabled: bool) {
        self.watching = enabled;
        self.quit_armed = false;
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn poll_event(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Option<BridgeEvent>, Self::Error> {
        let wake_at = match (deadline, self.status.flash_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let env = self.env;
        let timer = async move {
            match wake_at {
                Some(at) => env.sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let wake = tokio::select! {
            biased;

            Some(event) = self.network_rx.recv() => Wake::Network(event),
            event = self.keys.next() => Wake::Terminal(event),
            () = timer => Wake::Timer,
        };

        match wake {
            Wake::Network(event) => {
                self.forget_finished(&event);
                Ok(Some(event))
            },
            Wake::Terminal(Some(Ok(event))) => Ok(self.handle_terminal_event(event).await),
            Wake::Terminal(Some(Err(err))) => Err(err.into()),
            Wake::Terminal(None) => Ok(Some(BridgeEvent::Quit)),
            Wake::Timer => {
                if self.status.expire(self.env.now()) {
                    self.draw_status();
                }
                Ok(None)
            },
        }
    }

    async fn fetch_config(&mut self) -> Result<(), Self::Error> {
        let client = self.http.clone();
        let url = self.endpoints.config_url();
        let events = self.network_tx.clone();
        tokio::spawn(async move {
            let result = bootstrap::fetch_config(&client, url).await;
            if events.send(BridgeEvent::ConfigFetched(result)).is_err() {
                tracing::debug!("driver gone, dropping configuration");
            }
        });
        Ok(())
    }

    async fn open_transport(
        &mut self,
        transport: TransportId,
        socket_path: &str,
    ) -> Result<(), Self::Error> {
        let url = self.endpoints.socket_url(socket_path);
        let handle = transport::spawn(transport, url, self.network_tx.clone());
        if let Some(old) = self.transports.insert(transport, handle) {
            old.stop();
        }
        Ok(())
    }

    async fn send(&mut self, transport: TransportId, data: Bytes) -> Result<(), Self::Error> {
        match self.transports.get(&transport) {
            Some(handle) if handle.send(data) => {},
            _ => tracing::debug!(%transport, "send on finished transport dropped"),
        }
        Ok(())
    }

    async fn close_transport(&mut self, transport: TransportId) -> Result<(), Self::Error> {
        if let Some(handle) = self.transports.remove(&transport) {
            handle.close();
        }
        Ok(())
    }

    fn now(&self) -> Instant {
        self.env.now()
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if let Some(err) = self.pending_error.take() {
            return Err(err.into());
        }
        self.stdout.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        for (_, handle) in self.transports.drain() {
            handle.stop();
        }
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.stop();
        self.status = StatusLine::default();
        self.draw_status();
        let _ = self.stdout.flush();
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer() -> FileDetails {
        FileDetails { name: "log.txt".into(), size: 1536, files_remaining: 1, bytes_remaining: 1536 }
    }

    #[test]
    fn flash_takes_priority_over_dialog() {
        let mut status = StatusLine::default();
        status.show_dialog(&Dialog::Notice { message: "Closed".into(), is_error: false });
        status.flash("Connecting...", None);

        assert_eq!(status.text().unwrap().text, "Connecting...");
    }

    #[test]
    fn expired_flash_reveals_dialog() {
        let mut status = StatusLine::default();
        status.show_dialog(&Dialog::Notice {
            message: "Connection closed abnormally".into(),
            is_error: true,
        });
        let now = SystemEnv::new().now();
        status.flash("Connected", Some(now));

        assert!(status.expire(now));
        let text = status.text().unwrap();
        assert!(text.is_error);
        insta::assert_snapshot!(text.text, @"Connection closed abnormally  [r] reconnect  [Ctrl-]] quit");
    }

    #[test]
    fn receive_dialog_shows_details_and_progress() {
        let mut status = StatusLine::default();
        status.show_dialog(&Dialog::ReceiveFile(offer()));
        assert_eq!(status.text().unwrap().text, "Receiving log.txt  [s] skip");

        status.set_file(&offer());
        status.set_progress(TransferProgress::new(384, 1536));

        insta::assert_snapshot!(
            status.text().unwrap().text,
            @"Files remaining: 1 | Bytes remaining: 1.50 KB | Filename: log.txt 25.00%  [s] skip"
        );
    }

    #[test]
    fn send_dialog_echoes_prompt() {
        let mut status = StatusLine::default();
        status.show_dialog(&Dialog::SendFiles);
        status.prompt_mut().push_str("a.txt");

        assert_eq!(status.text().unwrap().text, "Send files: a.txt_  [Enter] send  [Esc] cancel");

        status.hide_dialog();
        assert_eq!(status.text(), None);
    }

    #[test]
    fn dialog_keys_follow_choices() {
        let notice = Dialog::Notice { message: "Closed".into(), is_error: false };

        assert_eq!(pick(&notice, KeyCode::Char('R')), Some(DialogChoice::Reconnect));
        assert_eq!(pick(&notice, KeyCode::Char('s')), None);
        assert_eq!(pick(&Dialog::ReceiveFile(offer()), KeyCode::Char('s')), Some(DialogChoice::Skip));
        assert_eq!(pick(&Dialog::SendFiles, KeyCode::Enter), Some(DialogChoice::Send));
        assert_eq!(pick(&Dialog::SendFiles, KeyCode::Esc), Some(DialogChoice::Cancel));
        assert_eq!(pick(&Dialog::SendFiles, KeyCode::Char('r')), None);
    }

    #[test]
    fn remote_names_stay_in_download_dir() {
        assert_eq!(local_name("report.pdf"), "report.pdf");
        assert_eq!(local_name("../../etc/passwd"), "passwd");
        assert_eq!(local_name("dir/"), "dir");
        assert_eq!(local_name(".."), "download");
    }

    #[tokio::test]
    async fn missing_upload_reports_path() {
        let err = read_files("/nonexistent/ttybridge-upload").await.unwrap_err();

        assert!(err.to_string().starts_with("/nonexistent/ttybridge-upload: "));
    }
}
