//! File-transfer detection interface.
//!
//! A [`Sentry`] watches the terminal output stream for the start of an in-band
//! file-transfer session (ZMODEM or similar). While idle it hands bytes back as
//! [`SentryEvent::Terminal`]; once a session is detected it consumes them and
//! reports protocol events instead. The codec itself lives behind this trait so
//! the [`TransferAdapter`](crate::TransferAdapter) stays protocol-agnostic.

use bytes::Bytes;
use thiserror::Error;

/// Direction of a transfer, from the local point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    /// Remote side offers files to us.
    Receive,
    /// Remote side asks us for files.
    Send,
}

/// Metadata for the file currently being transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDetails {
    /// File name as announced by the sender
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Files left in the batch, including this one
    pub files_remaining: u32,
    /// Bytes left in the batch, including this file
    pub bytes_remaining: u64,
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    /// Name announced to the remote side
    pub name: String,
    /// File contents
    pub data: Bytes,
}

impl OutgoingFile {
    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Events reported by a [`Sentry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentryEvent {
    /// Ordinary terminal output.
    Terminal(Bytes),
    /// Protocol bytes to send to the remote side.
    Outbound(Bytes),
    /// A transfer session started.
    Detected(TransferDirection),
    /// A tentative detection turned out to be a false positive.
    Retracted,
    /// The remote side offers a file.
    Offer(FileDetails),
    /// A chunk of the offered file. `offset` counts bytes received so far.
    Payload {
        /// File data
        bytes: Bytes,
        /// Bytes of the current file received including this chunk
        offset: u64,
    },
    /// Upload progress for the current outgoing file.
    Progress {
        /// File being sent
        details: FileDetails,
        /// Bytes of that file sent so far
        offset: u64,
    },
    /// The current file finished.
    FileComplete,
    /// The transfer session ended.
    SessionEnd,
}

/// The codec could not make sense of the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transfer decode failed: {reason}")]
pub struct DecodeError {
    /// Codec diagnostic
    pub reason: String,
}

impl DecodeError {
    /// Build from any displayable diagnostic.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Result of every [`Sentry`] operation.
pub type SentryResult = Result<Vec<SentryEvent>, DecodeError>;

/// In-band transfer detector and codec.
///
/// Implementations must be synchronous and must not perform I/O. Bytes for the
/// remote side are returned as [`SentryEvent::Outbound`].
pub trait Sentry {
    /// Feed terminal output.
    fn consume(&mut self, input: &[u8]) -> SentryResult;

    /// Accept a detected session.
    fn confirm(&mut self) -> SentryResult;

    /// Accept the current file offer.
    fn accept_offer(&mut self) -> SentryResult;

    /// Decline the current file offer and end the session.
    fn skip_offer(&mut self) -> SentryResult;

    /// Upload `files` and close the session.
    ///
    /// Completion may be reported now or later from [`Sentry::consume`] as
    /// the remote side acknowledges.
    fn send_files(&mut self, files: &[OutgoingFile]) -> SentryResult;

    /// End the session without sending anything.
    fn end_session(&mut self) -> SentryResult;

    /// Forget any session state after an error.
    fn reset(&mut self);
}

/// Sentry that never detects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSentry;

impl Sentry for PassthroughSentry {
    fn consume(&mut self, input: &[u8]) -> SentryResult {
        Ok(vec![SentryEvent::Terminal(Bytes::copy_from_slice(input))])
    }

    fn confirm(&mut self) -> SentryResult {
        Ok(Vec::new())
    }

    fn accept_offer(&mut self) -> SentryResult {
        Ok(Vec::new())
    }

    fn skip_offer(&mut self) -> SentryResult {
        Ok(Vec::new())
    }

    fn send_files(&mut self, _files: &[OutgoingFile]) -> SentryResult {
        Ok(Vec::new())
    }

    fn end_session(&mut self) -> SentryResult {
        Ok(Vec::new())
    }

    fn reset(&mut self) {}
}
