//! ZMODEM handshake detection.
//!
//! `rz` and `sz` announce themselves with a hex header. [`ZmodemSentry`]
//! spots those headers in terminal output and reports a transfer session.
//! No ZMODEM codec is linked into the binary, so every detected session is
//! declined: confirming it answers with the cancel sequence and ends the
//! session, and the remote program gives up cleanly.

use bytes::Bytes;
use ttybridge_core::{
    OutgoingFile, Sentry, SentryEvent, SentryResult, TransferDirection,
};

/// `ZRQINIT` header: the remote `sz` wants to send us files.
pub const ZRQINIT: &[u8] = b"**\x18B00";

/// `ZRINIT` header: the remote `rz` is ready to receive files.
pub const ZRINIT: &[u8] = b"**\x18B01";

/// Eight `CAN` followed by eight backspaces.
pub const CANCEL_SEQUENCE: &[u8] =
    b"\x18\x18\x18\x18\x18\x18\x18\x18\x08\x08\x08\x08\x08\x08\x08\x08";

const HEADER_LEN: usize = 6;

/// Detects ZMODEM sessions and declines them.
#[derive(Debug, Default)]
pub struct ZmodemSentry {
    /// Trailing output, so headers split across messages are still seen.
    tail: Vec<u8>,
    /// A session was detected and not yet ended.
    active: bool,
}

impl ZmodemSentry {
    /// Idle sentry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn find_header(&self, input: &[u8]) -> Option<(usize, TransferDirection)> {
        let mut window = self.tail.clone();
        window.extend_from_slice(input);

        window.windows(HEADER_LEN).enumerate().find_map(|(pos, candidate)| {
            let direction = match candidate {
                c if c == ZRQINIT => TransferDirection::Receive,
                c if c == ZRINIT => TransferDirection::Send,
                _ => return None,
            };
            Some((pos.saturating_sub(self.tail.len()), direction))
        })
    }

    fn remember(&mut self, input: &[u8]) {
        self.tail.extend_from_slice(input);
        let excess = self.tail.len().saturating_sub(HEADER_LEN - 1);
        self.tail.drain(..excess);
    }

    fn cancel(&mut self) -> SentryResult {
        self.active = false;
        self.tail.clear();
        Ok(vec![SentryEvent::Outbound(Bytes::from_static(CANCEL_SEQUENCE)), SentryEvent::SessionEnd])
    }
}

impl Sentry for ZmodemSentry {
    fn consume(&mut self, input: &[u8]) -> SentryResult {
        if self.active {
            tracing::trace!(len = input.len(), "dropping zmodem bytes");
            return Ok(Vec::new());
        }

        let Some((start, direction)) = self.find_header(input) else {
            self.remember(input);
            return Ok(vec![SentryEvent::Terminal(Bytes::copy_from_slice(input))]);
        };

        tracing::info!(?direction, "zmodem header detected");
        self.active = true;
        self.tail.clear();

        let mut events = Vec::with_capacity(2);
        if start > 0 {
            events.push(SentryEvent::Terminal(Bytes::copy_from_slice(&input[..start])));
        }
        events.push(SentryEvent::Detected(direction));
        Ok(events)
    }

    fn confirm(&mut self) -> SentryResult {
        tracing::info!("no zmodem codec available, declining transfer");
        self.cancel()
    }

    fn accept_offer(&mut self) -> SentryResult {
        self.cancel()
    }

    fn skip_offer(&mut self) -> SentryResult {
        self.cancel()
    }

    fn send_files(&mut self, _files: &[OutgoingFile]) -> SentryResult {
        self.cancel()
    }

    fn end_session(&mut self) -> SentryResult {
        self.cancel()
    }

    fn reset(&mut self) {
        self.active = false;
        self.tail.clear();
    }
}
