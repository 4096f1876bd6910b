//! Transfer adapter behavior against a scripted sentry.

use std::collections::VecDeque;

use bytes::Bytes;
use ttybridge_core::{
    DecodeError, FileDetails, OutgoingFile, Sentry, SentryEvent, SentryResult, TransferAction,
    TransferAdapter, TransferDirection, TransferPhase,
};
use ttybridge_proto::{ClientCommand, MAX_CHUNK_PAYLOAD};

/// Sentry whose `consume` results are queued up front. Once the queue runs
/// dry it passes output through.
#[derive(Default)]
struct Script {
    consume: VecDeque<SentryResult>,
    confirm: Vec<SentryEvent>,
    skip: Vec<SentryEvent>,
    resets: usize,
    sent: Vec<String>,
}

impl Script {
    fn then(mut self, result: SentryResult) -> Self {
        self.consume.push_back(result);
        self
    }
}

impl Sentry for Script {
    fn consume(&mut self, input: &[u8]) -> SentryResult {
        self.consume
            .pop_front()
            .unwrap_or_else(|| Ok(vec![SentryEvent::Terminal(Bytes::copy_from_slice(input))]))
    }

    fn confirm(&mut self) -> SentryResult {
        Ok(std::mem::take(&mut self.confirm))
    }

    fn accept_offer(&mut self) -> SentryResult {
        Ok(vec![SentryEvent::Outbound(Bytes::from_static(b"ACK"))])
    }

    fn skip_offer(&mut self) -> SentryResult {
        Ok(std::mem::take(&mut self.skip))
    }

    fn send_files(&mut self, files: &[OutgoingFile]) -> SentryResult {
        let mut events = Vec::new();
        let mut remaining: u64 = files.iter().map(OutgoingFile::size).sum();
        for (index, file) in files.iter().enumerate() {
            self.sent.push(file.name.clone());
            let details = FileDetails {
                name: file.name.clone(),
                size: file.size(),
                files_remaining: u32::try_from(files.len() - index).unwrap(),
                bytes_remaining: remaining,
            };
            events.push(SentryEvent::Outbound(file.data.clone()));
            events.push(SentryEvent::Progress { details, offset: file.size() });
            events.push(SentryEvent::FileComplete);
            remaining -= file.size();
        }
        events.push(SentryEvent::SessionEnd);
        Ok(events)
    }

    fn end_session(&mut self) -> SentryResult {
        Ok(vec![SentryEvent::Outbound(Bytes::from_static(b"OO")), SentryEvent::SessionEnd])
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

fn offer(name: &str, size: u64) -> FileDetails {
    FileDetails { name: name.into(), size, files_remaining: 1, bytes_remaining: size }
}

fn is_phase_end(actions: &[TransferAction], phase: TransferPhase) -> bool {
    actions.contains(&TransferAction::Ended(phase))
}

#[test]
fn receive_session_saves_file_and_reenables() {
    let script = Script::default()
        .then(Ok(vec![
            SentryEvent::Terminal(Bytes::from_static(b"rz\r\n")),
            SentryEvent::Detected(TransferDirection::Receive),
        ]))
        .then(Ok(vec![SentryEvent::Offer(offer("notes.txt", 8))]))
        .then(Ok(vec![SentryEvent::Payload { bytes: Bytes::from_static(b"abcd"), offset: 4 }]))
        .then(Ok(vec![
            SentryEvent::Payload { bytes: Bytes::from_static(b"efgh"), offset: 8 },
            SentryEvent::FileComplete,
            SentryEvent::SessionEnd,
        ]));
    let mut adapter = TransferAdapter::new(script);

    let actions = adapter.consume(b"detect");
    assert_eq!(actions[0], TransferAction::Render(Bytes::from_static(b"rz\r\n")));
    assert_eq!(actions[1], TransferAction::Started(TransferDirection::Receive));
    assert_eq!(adapter.session().unwrap().phase(), TransferPhase::Confirmed);

    let actions = adapter.consume(b"offer");
    assert_eq!(actions[0], TransferAction::OfferReceived(offer("notes.txt", 8)));
    assert!(matches!(&actions[1], TransferAction::Send(frame) if frame.payload[..] == b"ACK"[..]));

    let actions = adapter.consume(b"data");
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], TransferAction::Progress(p) if p.to_string() == "50.00"));
    assert_eq!(adapter.session().unwrap().bytes_remaining(), 4);

    let actions = adapter.consume(b"rest");
    assert!(actions.contains(&TransferAction::SaveFile {
        name: "notes.txt".into(),
        data: Bytes::from_static(b"abcdefgh"),
    }));
    assert!(is_phase_end(&actions, TransferPhase::Completed));
    assert!(!adapter.is_active());

    let actions = adapter.consume(b"$ ");
    assert_eq!(actions, vec![TransferAction::Render(Bytes::from_static(b"$ "))]);
}

#[test]
fn skip_ends_session_and_later_offer_starts_new_one() {
    let mut script = Script::default()
        .then(Ok(vec![SentryEvent::Detected(TransferDirection::Receive)]))
        .then(Ok(vec![SentryEvent::Offer(offer("big.iso", 1 << 20))]))
        .then(Ok(vec![SentryEvent::Offer(offer("small.txt", 3))]));
    script.skip = vec![SentryEvent::Outbound(Bytes::from_static(b"SKIP"))];
    let mut adapter = TransferAdapter::new(script);

    adapter.consume(b"detect");
    adapter.consume(b"offer");
    let actions = adapter.skip();

    assert!(matches!(&actions[0], TransferAction::Send(frame) if frame.payload[..] == b"SKIP"[..]));
    assert!(is_phase_end(&actions, TransferPhase::Skipped));
    assert!(!adapter.is_active());

    let actions = adapter.consume(b"offer");
    assert_eq!(actions[0], TransferAction::Started(TransferDirection::Receive));
    assert_eq!(actions[1], TransferAction::OfferReceived(offer("small.txt", 3)));
    assert_eq!(adapter.session().unwrap().phase(), TransferPhase::Transferring);
}

#[test]
fn send_session_uploads_selected_files() {
    let script = Script::default().then(Ok(vec![SentryEvent::Detected(TransferDirection::Send)]));
    let mut adapter = TransferAdapter::new(script);

    let actions = adapter.consume(b"sz");
    assert_eq!(
        actions,
        vec![TransferAction::Started(TransferDirection::Send), TransferAction::RequestFiles]
    );

    let files = vec![
        OutgoingFile { name: "a".into(), data: Bytes::from(vec![1u8; 10]) },
        OutgoingFile { name: "b".into(), data: Bytes::from(vec![2u8; 30]) },
    ];
    let actions = adapter.select_files(&files);

    let infos: Vec<_> = actions
        .iter()
        .filter_map(|a| match a {
            TransferAction::FileInfo(details) => Some(details.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(infos, vec!["a", "b"]);
    assert!(is_phase_end(&actions, TransferPhase::Completed));
    assert_eq!(adapter.sentry().sent, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn empty_selection_cancels_send_session() {
    let script = Script::default().then(Ok(vec![SentryEvent::Detected(TransferDirection::Send)]));
    let mut adapter = TransferAdapter::new(script);
    adapter.consume(b"sz");

    let actions = adapter.select_files(&[]);

    assert!(matches!(&actions[0], TransferAction::Send(frame) if frame.payload[..] == b"OO"[..]));
    assert!(is_phase_end(&actions, TransferPhase::Skipped));
    assert!(!adapter.is_active());
}

#[test]
fn rejection_during_confirm_ends_session() {
    let mut script =
        Script::default().then(Ok(vec![SentryEvent::Detected(TransferDirection::Send)]));
    script.confirm = vec![SentryEvent::Outbound(Bytes::from_static(b"CANCEL")), SentryEvent::SessionEnd];
    let mut adapter = TransferAdapter::new(script);

    let actions = adapter.consume(b"sz");

    assert!(!actions.contains(&TransferAction::RequestFiles));
    assert!(is_phase_end(&actions, TransferPhase::Rejected));
    assert!(!adapter.is_active());
}

#[test]
fn decode_error_resets_and_fails_open() {
    let script = Script::default()
        .then(Ok(vec![SentryEvent::Detected(TransferDirection::Receive)]))
        .then(Err(DecodeError::new("bad CRC")));
    let mut adapter = TransferAdapter::new(script);
    adapter.consume(b"detect");

    let actions = adapter.consume(b"garbage");

    assert_eq!(actions, vec![TransferAction::Aborted { reason: "bad CRC".into() }]);
    assert!(!adapter.is_active());
    assert_eq!(adapter.sentry().resets, 1);

    let actions = adapter.consume(b"ok");
    assert_eq!(actions, vec![TransferAction::Render(Bytes::from_static(b"ok"))]);
}

#[test]
fn retraction_before_transfer_drops_session() {
    let script = Script::default()
        .then(Ok(vec![SentryEvent::Detected(TransferDirection::Receive)]))
        .then(Ok(vec![
            SentryEvent::Retracted,
            SentryEvent::Terminal(Bytes::from_static(b"**B0 just text")),
        ]));
    let mut adapter = TransferAdapter::new(script);
    adapter.consume(b"detect");

    let actions = adapter.consume(b"more");

    assert_eq!(actions[0], TransferAction::Ended(TransferPhase::Retracted));
    assert_eq!(actions[1], TransferAction::Render(Bytes::from_static(b"**B0 just text")));
    assert!(!adapter.is_active());
}

#[test]
fn outbound_protocol_bytes_are_chunked() {
    let big = Bytes::from(vec![0x2a; MAX_CHUNK_PAYLOAD * 2 + 1]);
    let script = Script::default().then(Ok(vec![SentryEvent::Outbound(big)]));
    let mut adapter = TransferAdapter::new(script);

    let actions = adapter.consume(b"x");

    assert_eq!(actions.len(), 3);
    for action in &actions {
        let TransferAction::Send(frame) = action else { panic!("expected send, got {action:?}") };
        assert_eq!(frame.client_command(), Some(ClientCommand::Input));
        assert!(frame.payload.len() <= MAX_CHUNK_PAYLOAD);
    }
}

#[test]
fn abort_drops_active_session() {
    let script = Script::default().then(Ok(vec![SentryEvent::Detected(TransferDirection::Send)]));
    let mut adapter = TransferAdapter::new(script);
    adapter.consume(b"sz");

    let actions = adapter.abort("connection closed");

    assert_eq!(actions, vec![TransferAction::Aborted { reason: "connection closed".into() }]);
    assert!(!adapter.is_active());
    assert_eq!(adapter.sentry().resets, 1);
}
