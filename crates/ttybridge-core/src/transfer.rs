//! Transfer session state machine.
//!
//! Sits between the decoded terminal output and the renderer. While no session
//! is active, output passes straight through. When the [`Sentry`] detects a
//! session, output is diverted into it until the session ends, and the adapter
//! reports dialogs, progress and finished files as [`TransferAction`]s.
//!
//! Codec failures are fail-open: the error is logged, the sentry is reset and
//! the terminal goes back to normal. Nothing is surfaced to the user beyond
//! the dialog closing.

use std::{collections::VecDeque, fmt};

use bytes::{Bytes, BytesMut};
use ttybridge_proto::{Frame, chunk_input};

use crate::sentry::{
    DecodeError, FileDetails, OutgoingFile, Sentry, SentryEvent, SentryResult, TransferDirection,
};

/// Lifecycle of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPhase {
    /// Sentry reported a session, not yet confirmed
    Detected,
    /// Session confirmed, waiting for an offer or a file selection
    Confirmed,
    /// Data is flowing
    Transferring,
    /// Session ended normally
    Completed,
    /// User skipped the offer or cancelled the selection
    Skipped,
    /// Codec declined the session
    Rejected,
    /// Detection turned out to be a false positive
    Retracted,
}

/// Bookkeeping for the active transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSession {
    /// Uploading to the remote side.
    Sending {
        /// Current phase
        phase: TransferPhase,
        /// Names of the selected files
        files: Vec<String>,
        /// File whose progress was last reported
        current: Option<String>,
        /// Bytes left in the batch
        bytes_remaining: u64,
        /// Files left in the batch
        files_remaining: u32,
    },
    /// Downloading from the remote side.
    Receiving {
        /// Current phase
        phase: TransferPhase,
        /// File currently offered
        file: Option<FileDetails>,
        /// Bytes left in the batch
        bytes_remaining: u64,
        /// Files left in the batch
        files_remaining: u32,
        /// Data of the current file received so far
        buffer: BytesMut,
    },
}

impl TransferSession {
    fn new(direction: TransferDirection) -> Self {
        match direction {
            TransferDirection::Send => Self::Sending {
                phase: TransferPhase::Detected,
                files: Vec::new(),
                current: None,
                bytes_remaining: 0,
                files_remaining: 0,
            },
            TransferDirection::Receive => Self::Receiving {
                phase: TransferPhase::Detected,
                file: None,
                bytes_remaining: 0,
                files_remaining: 0,
                buffer: BytesMut::new(),
            },
        }
    }

    /// Direction of the session.
    #[must_use]
    pub fn direction(&self) -> TransferDirection {
        match self {
            Self::Sending { .. } => TransferDirection::Send,
            Self::Receiving { .. } => TransferDirection::Receive,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TransferPhase {
        match self {
            Self::Sending { phase, .. } | Self::Receiving { phase, .. } => *phase,
        }
    }

    /// Bytes left in the batch.
    #[must_use]
    pub fn bytes_remaining(&self) -> u64 {
        match self {
            Self::Sending { bytes_remaining, .. } | Self::Receiving { bytes_remaining, .. } => {
                *bytes_remaining
            },
        }
    }

    /// Files left in the batch.
    #[must_use]
    pub fn files_remaining(&self) -> u32 {
        match self {
            Self::Sending { files_remaining, .. } | Self::Receiving { files_remaining, .. } => {
                *files_remaining
            },
        }
    }

    fn set_phase(&mut self, next: TransferPhase) {
        match self {
            Self::Sending { phase, .. } | Self::Receiving { phase, .. } => *phase = next,
        }
    }
}

/// Percentage of the current file transferred, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    percent: f64,
}

impl TransferProgress {
    /// Progress after `offset` of `size` bytes. An empty file is complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(offset: u64, size: u64) -> Self {
        if size == 0 {
            return Self { percent: 100.0 };
        }
        let raw = 100.0 * offset as f64 / size as f64;
        Self { percent: (raw * 100.0).round() / 100.0 }
    }

    /// Percent complete.
    #[must_use]
    pub fn percent(self) -> f64 {
        self.percent
    }
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.percent)
    }
}

/// Actions returned by the transfer adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferAction {
    /// Render terminal output.
    Render(Bytes),
    /// Send an input frame to the remote side.
    Send(Frame),
    /// A session started; local input must be disabled.
    Started(TransferDirection),
    /// Remote offers a file; show the receive dialog with a skip choice.
    OfferReceived(FileDetails),
    /// Remote wants files; ask the user to pick some.
    RequestFiles,
    /// Details of the file being uploaded.
    FileInfo(FileDetails),
    /// Progress of the current file.
    Progress(TransferProgress),
    /// A received file is complete.
    SaveFile {
        /// Announced file name
        name: String,
        /// File contents
        data: Bytes,
    },
    /// The session ended in `phase`.
    Ended(TransferPhase),
    /// The session was dropped after an error.
    Aborted {
        /// Diagnostic, for logs
        reason: String,
    },
}

/// Routes terminal output through a [`Sentry`] and tracks the session.
///
/// At most one session exists at a time.
#[derive(Debug)]
pub struct TransferAdapter<S> {
    sentry: S,
    session: Option<TransferSession>,
}

impl<S: Sentry> TransferAdapter<S> {
    /// Wrap a sentry.
    pub fn new(sentry: S) -> Self {
        Self { sentry, session: None }
    }

    /// The wrapped sentry.
    pub fn sentry(&self) -> &S {
        &self.sentry
    }

    /// Active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    /// Whether a session is active. Local input is disabled while it is.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Feed decoded terminal output.
    pub fn consume(&mut self, output: &[u8]) -> Vec<TransferAction> {
        let result = self.sentry.consume(output);
        self.run(result)
    }

    /// User declined the offered file. Ends the session.
    pub fn skip(&mut self) -> Vec<TransferAction> {
        if !matches!(self.session, Some(TransferSession::Receiving { .. })) {
            tracing::debug!("skip ignored: no incoming transfer");
            return Vec::new();
        }
        self.set_phase(TransferPhase::Skipped);
        let result = self.sentry.skip_offer();
        let mut actions = self.run(result);
        actions.extend(self.finish());
        actions
    }

    /// User picked files to upload. An empty selection cancels the session.
    pub fn select_files(&mut self, selection: &[OutgoingFile]) -> Vec<TransferAction> {
        let Some(TransferSession::Sending {
            phase: phase @ TransferPhase::Confirmed,
            files,
            bytes_remaining,
            files_remaining,
            ..
        }) = &mut self.session
        else {
            tracing::debug!("file selection ignored: no outgoing transfer awaiting files");
            return Vec::new();
        };

        if selection.is_empty() {
            tracing::info!("file selection cancelled");
            *phase = TransferPhase::Skipped;
            let result = self.sentry.end_session();
            let mut actions = self.run(result);
            actions.extend(self.finish());
            return actions;
        }

        *phase = TransferPhase::Transferring;
        *files = selection.iter().map(|f| f.name.clone()).collect();
        *bytes_remaining = selection.iter().map(OutgoingFile::size).sum();
        *files_remaining = u32::try_from(selection.len()).unwrap_or(u32::MAX);
        tracing::info!(files = selection.len(), bytes = *bytes_remaining, "sending files");

        let result = self.sentry.send_files(selection);
        self.run(result)
    }

    /// Drop the session because the connection went away.
    pub fn abort(&mut self, reason: &str) -> Vec<TransferAction> {
        if self.session.take().is_none() {
            return Vec::new();
        }
        tracing::info!(reason, "transfer aborted");
        self.sentry.reset();
        vec![TransferAction::Aborted { reason: reason.to_string() }]
    }

    fn run(&mut self, result: SentryResult) -> Vec<TransferAction> {
        let mut actions = Vec::new();
        let mut queue: VecDeque<SentryEvent> = match result {
            Ok(events) => events.into(),
            Err(err) => return self.fail(&err),
        };

        while let Some(event) = queue.pop_front() {
            match self.apply(event, &mut actions) {
                Ok(follow_up) => queue.extend(follow_up),
                Err(err) => {
                    actions.extend(self.fail(&err));
                    break;
                },
            }
        }
        actions
    }

    /// Apply one event; returns events produced by sentry calls it made.
    fn apply(&mut self, event: SentryEvent, actions: &mut Vec<TransferAction>) -> SentryResult {
        match event {
            SentryEvent::Terminal(bytes) => actions.push(TransferAction::Render(bytes)),
            SentryEvent::Outbound(bytes) => {
                actions.extend(chunk_input(&bytes).map(TransferAction::Send));
            },
            SentryEvent::Detected(direction) => return self.on_detected(direction, actions),
            SentryEvent::Retracted => {
                if matches!(
                    self.session.as_ref().map(TransferSession::phase),
                    Some(TransferPhase::Detected | TransferPhase::Confirmed)
                ) {
                    tracing::debug!("transfer detection retracted");
                    self.session = None;
                    actions.push(TransferAction::Ended(TransferPhase::Retracted));
                }
            },
            SentryEvent::Offer(details) => return self.on_offer(details, actions),
            SentryEvent::Payload { bytes, offset } => self.on_payload(&bytes, offset, actions),
            SentryEvent::Progress { details, offset } => self.on_progress(details, offset, actions),
            SentryEvent::FileComplete => self.on_file_complete(actions),
            SentryEvent::SessionEnd => actions.extend(self.finish()),
        }
        Ok(Vec::new())
    }

    fn on_detected(
        &mut self,
        direction: TransferDirection,
        actions: &mut Vec<TransferAction>,
    ) -> SentryResult {
        if let Some(session) = &self.session {
            tracing::warn!(
                active = ?session.direction(),
                detected = ?direction,
                "ignoring detection during active transfer"
            );
            return Ok(Vec::new());
        }

        tracing::info!(?direction, "transfer session detected");
        self.session = Some(TransferSession::new(direction));
        actions.push(TransferAction::Started(direction));

        let follow_up = self.sentry.confirm()?;
        if follow_up.contains(&SentryEvent::SessionEnd) {
            self.set_phase(TransferPhase::Rejected);
        } else {
            self.set_phase(TransferPhase::Confirmed);
            if direction == TransferDirection::Send {
                actions.push(TransferAction::RequestFiles);
            }
        }
        Ok(follow_up)
    }

    fn on_offer(&mut self, details: FileDetails, actions: &mut Vec<TransferAction>) -> SentryResult {
        if self.session.is_none() {
            self.session = Some(TransferSession::new(TransferDirection::Receive));
            actions.push(TransferAction::Started(TransferDirection::Receive));
        }
        let Some(TransferSession::Receiving {
            phase,
            file,
            bytes_remaining,
            files_remaining,
            buffer,
        }) = &mut self.session
        else {
            tracing::warn!(name = %details.name, "ignoring file offer during upload");
            return Ok(Vec::new());
        };

        tracing::info!(name = %details.name, size = details.size, "receiving file");
        *phase = TransferPhase::Transferring;
        *bytes_remaining = details.bytes_remaining;
        *files_remaining = details.files_remaining;
        *file = Some(details.clone());
        buffer.clear();

        actions.push(TransferAction::OfferReceived(details));
        self.sentry.accept_offer()
    }

    fn on_payload(&mut self, bytes: &[u8], offset: u64, actions: &mut Vec<TransferAction>) {
        let Some(TransferSession::Receiving {
            file: Some(file), bytes_remaining, buffer, ..
        }) = &mut self.session
        else {
            tracing::warn!(len = bytes.len(), "dropping payload outside an accepted offer");
            return;
        };

        buffer.extend_from_slice(bytes);
        *bytes_remaining = file.bytes_remaining.saturating_sub(offset);
        actions.push(TransferAction::Progress(TransferProgress::new(offset, file.size)));
    }

    fn on_progress(&mut self, details: FileDetails, offset: u64, actions: &mut Vec<TransferAction>) {
        let Some(TransferSession::Sending {
            current, bytes_remaining, files_remaining, ..
        }) = &mut self.session
        else {
            return;
        };

        *bytes_remaining = details.bytes_remaining.saturating_sub(offset);
        *files_remaining = details.files_remaining;
        let progress = TransferProgress::new(offset, details.size);
        if current.as_deref() != Some(details.name.as_str()) {
            *current = Some(details.name.clone());
            actions.push(TransferAction::FileInfo(details));
        }
        actions.push(TransferAction::Progress(progress));
    }

    fn on_file_complete(&mut self, actions: &mut Vec<TransferAction>) {
        match &mut self.session {
            Some(TransferSession::Receiving { phase, file, files_remaining, buffer, .. }) => {
                if let Some(file) = file.take() {
                    tracing::info!(name = %file.name, "file received");
                    actions.push(TransferAction::SaveFile {
                        name: file.name,
                        data: buffer.split().freeze(),
                    });
                }
                *files_remaining = files_remaining.saturating_sub(1);
                *phase = TransferPhase::Confirmed;
            },
            Some(TransferSession::Sending { files_remaining, .. }) => {
                *files_remaining = files_remaining.saturating_sub(1);
            },
            None => {},
        }
    }

    /// Destroy the session and report how it ended.
    fn finish(&mut self) -> Option<TransferAction> {
        let session = self.session.take()?;
        let phase = match session.phase() {
            phase @ (TransferPhase::Skipped | TransferPhase::Rejected) => phase,
            _ => TransferPhase::Completed,
        };
        tracing::info!(direction = ?session.direction(), ?phase, "transfer session ended");
        Some(TransferAction::Ended(phase))
    }

    fn fail(&mut self, err: &DecodeError) -> Vec<TransferAction> {
        tracing::warn!(%err, "transfer codec failed, resuming terminal");
        self.sentry.reset();
        match self.session.take() {
            Some(_) => vec![TransferAction::Aborted { reason: err.reason.clone() }],
            None => Vec::new(),
        }
    }

    fn set_phase(&mut self, phase: TransferPhase) {
        if let Some(session) = &mut self.session {
            session.set_phase(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentry::PassthroughSentry;

    #[test]
    fn progress_rounds_to_two_decimals() {
        assert_eq!(TransferProgress::new(50, 200).to_string(), "25.00");
        assert_eq!(TransferProgress::new(1, 3).to_string(), "33.33");
        assert_eq!(TransferProgress::new(2, 3).percent(), 66.67);
    }

    #[test]
    fn empty_file_progress_is_complete() {
        assert_eq!(TransferProgress::new(0, 0).percent(), 100.0);
    }

    #[test]
    fn passthrough_renders_output() {
        let mut adapter = TransferAdapter::new(PassthroughSentry);
        let actions = adapter.consume(b"hello");

        assert_eq!(actions, vec![TransferAction::Render(Bytes::from_static(b"hello"))]);
        assert!(!adapter.is_active());
    }

    #[test]
    fn skip_and_select_without_session_are_noops() {
        let mut adapter = TransferAdapter::new(PassthroughSentry);

        assert!(adapter.skip().is_empty());
        assert!(adapter.select_files(&[]).is_empty());
        assert!(adapter.abort("closed").is_empty());
    }
}
