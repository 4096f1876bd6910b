//! Scripted transfer sentry.
//!
//! Stands in for a real transfer codec. Tests queue trigger rules: when a
//! chunk of terminal output contains the trigger at the head of the queue, the
//! rule's events are returned; everything else passes through as terminal
//! output. Every call is recorded so tests can assert on the conversation.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use ttybridge_core::{
    DecodeError, FileDetails, OutgoingFile, Sentry, SentryEvent, SentryResult,
};

/// Bytes sent when the user skips an offer.
pub const SKIP_SEQUENCE: &[u8] = b"<skip>";

/// Bytes sent when a session is ended without files.
pub const END_SEQUENCE: &[u8] = b"<end>";

/// A call made on the sentry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentryCall {
    /// `consume` with this input
    Consume(Vec<u8>),
    /// `confirm`
    Confirm,
    /// `accept_offer`
    AcceptOffer,
    /// `skip_offer`
    SkipOffer,
    /// `send_files` with these names
    SendFiles(Vec<String>),
    /// `end_session`
    EndSession,
    /// `reset`
    Reset,
}

struct Rule {
    trigger: Vec<u8>,
    result: SentryResult,
}

#[derive(Default)]
struct Script {
    rules: VecDeque<Rule>,
    on_confirm: Option<Vec<SentryEvent>>,
    calls: Vec<SentryCall>,
}

/// Sentry driven by queued trigger rules.
///
/// Clones share the script, so a test can keep a handle after moving the
/// sentry into a bridge.
#[derive(Clone, Default)]
pub struct ScriptedSentry {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSentry {
    /// Sentry with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a rule: output containing `trigger` yields `result`.
    pub fn on(&self, trigger: &[u8], result: SentryResult) -> &Self {
        self.script().rules.push_back(Rule { trigger: trigger.to_vec(), result });
        self
    }

    /// Queue a rule that yields `events`.
    pub fn on_events(&self, trigger: &[u8], events: Vec<SentryEvent>) -> &Self {
        self.on(trigger, Ok(events))
    }

    /// Make the next `confirm` return `events` instead of nothing.
    pub fn on_confirm(&self, events: Vec<SentryEvent>) -> &Self {
        self.script().on_confirm = Some(events);
        self
    }

    /// Queue a rule that fails decoding.
    pub fn fail_on(&self, trigger: &[u8], reason: &str) -> &Self {
        self.on(trigger, Err(DecodeError::new(reason)))
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<SentryCall> {
        self.script().calls.clone()
    }

    /// Rules not yet triggered.
    #[must_use]
    pub fn pending_rules(&self) -> usize {
        self.script().rules.len()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

impl Sentry for ScriptedSentry {
    fn consume(&mut self, input: &[u8]) -> SentryResult {
        let mut script = self.script();
        script.calls.push(SentryCall::Consume(input.to_vec()));

        if script.rules.front().is_some_and(|rule| contains(input, &rule.trigger)) {
            if let Some(rule) = script.rules.pop_front() {
                return rule.result;
            }
        }
        Ok(vec![SentryEvent::Terminal(Bytes::copy_from_slice(input))])
    }

    fn confirm(&mut self) -> SentryResult {
        let mut script = self.script();
        script.calls.push(SentryCall::Confirm);
        Ok(script.on_confirm.take().unwrap_or_default())
    }

    fn accept_offer(&mut self) -> SentryResult {
        self.script().calls.push(SentryCall::AcceptOffer);
        Ok(Vec::new())
    }

    fn skip_offer(&mut self) -> SentryResult {
        self.script().calls.push(SentryCall::SkipOffer);
        Ok(vec![SentryEvent::Outbound(Bytes::from_static(SKIP_SEQUENCE))])
    }

    fn send_files(&mut self, files: &[OutgoingFile]) -> SentryResult {
        self.script().calls.push(SentryCall::SendFiles(
            files.iter().map(|f| f.name.clone()).collect(),
        ));

        let mut events = Vec::new();
        let mut bytes_remaining: u64 = files.iter().map(OutgoingFile::size).sum();
        let count = u32::try_from(files.len()).unwrap_or(u32::MAX);
        for (sent, file) in (0u32..).zip(files) {
            let details = FileDetails {
                name: file.name.clone(),
                size: file.size(),
                files_remaining: count - sent,
                bytes_remaining,
            };
            events.push(SentryEvent::Outbound(file.data.clone()));
            events.push(SentryEvent::Progress { details, offset: file.size() });
            events.push(SentryEvent::FileComplete);
            bytes_remaining -= file.size();
        }
        events.push(SentryEvent::SessionEnd);
        Ok(events)
    }

    fn end_session(&mut self) -> SentryResult {
        self.script().calls.push(SentryCall::EndSession);
        Ok(vec![SentryEvent::Outbound(Bytes::from_static(END_SEQUENCE)), SentryEvent::SessionEnd])
    }

    fn reset(&mut self) {
        self.script().calls.push(SentryCall::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_output_passes_through() {
        let mut sentry = ScriptedSentry::new();
        sentry.on_events(b"**B00", vec![SentryEvent::SessionEnd]);

        let events = sentry.consume(b"plain").unwrap();

        assert_eq!(events, vec![SentryEvent::Terminal(Bytes::from_static(b"plain"))]);
        assert_eq!(sentry.pending_rules(), 1);
    }

    #[test]
    fn rules_fire_in_order() {
        let mut sentry = ScriptedSentry::new();
        sentry.on_events(b"first", vec![SentryEvent::Retracted]);
        sentry.on_events(b"second", vec![SentryEvent::SessionEnd]);

        assert_eq!(sentry.consume(b"second").unwrap().len(), 1);
        assert_eq!(sentry.consume(b"..first..").unwrap(), vec![SentryEvent::Retracted]);
        assert_eq!(sentry.consume(b"second").unwrap(), vec![SentryEvent::SessionEnd]);
    }

    #[test]
    fn clones_share_calls() {
        let handle = ScriptedSentry::new();
        let mut sentry = handle.clone();
        sentry.reset();

        assert_eq!(handle.calls(), vec![SentryCall::Reset]);
    }
}
