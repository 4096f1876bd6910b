//! End-to-end scenarios through the production runtime.
//!
//! Each test scripts server traffic and user events into a [`SimDriver`],
//! runs the real [`Runtime`] on a virtual clock, and checks what reached the
//! server and the terminal surface.
//!
//! # Oracle Pattern
//!
//! Tests end with oracle checks that verify:
//! - Messages sent to the server, decoded as the server sees them
//! - Terminal output and surface updates
//! - Transport lifecycle as seen by the driver

use std::time::Duration;

use bytes::Bytes;
use ttybridge_app::{Bridge, BridgeEvent, Dialog, Runtime, TRANSFER_REJECTED_MESSAGE, UiAction};
use ttybridge_core::{
    BootstrapError, ConnectionConfig, Environment, FileDetails, OutgoingFile, SentryEvent,
    Session, TransferDirection, TransferProgress, TransportId,
};
use ttybridge_harness::{InvariantRegistry, ScriptedSentry, SentryCall, SimDriver, SimEnv, SimInstant};
use ttybridge_proto::{
    AuthRequest, ClientMessage, Preferences, ReconnectPolicy, ServerConfig, ServerMessage,
    WindowSize,
};

const FIRST: TransportId = TransportId::new(1);
const SECOND: TransportId = TransportId::new(2);

fn server_config() -> ServerConfig {
    ServerConfig { socket_path: "/ws".into(), service: "svc".into() }
}

fn driver(env: &SimEnv) -> SimDriver {
    SimDriver::new(env.clone())
        .with_config(Ok(server_config()))
        .with_auto_open()
        .with_invariants(InvariantRegistry::standard())
}

fn output(text: &[u8]) -> ServerMessage {
    ServerMessage::Output(Bytes::copy_from_slice(text))
}

async fn run(driver: &SimDriver, sentry: ScriptedSentry) {
    let bridge = Bridge::new(Session::new(None), ConnectionConfig::default(), sentry);
    Runtime::new(driver.clone(), bridge).run().await.unwrap();
}

fn handshake() -> Vec<ClientMessage> {
    vec![
        ClientMessage::Resize(WindowSize::new(80, 24)),
        ClientMessage::Auth(AuthRequest { auth_token: None, service_path: "svc".into() }),
    ]
}

#[tokio::test]
async fn session_lifecycle_end_to_end() {
    let env = SimEnv::new();
    let driver = driver(&env);

    let mut preferences = serde_json::Map::new();
    preferences.insert("fontSize".into(), serde_json::json!(14));

    driver.inject_server(FIRST, output(b"hello"));
    driver.inject_server(FIRST, ServerMessage::SetWindowTitle("host".into()));
    driver.inject_event(BridgeEvent::TerminalTitle("vim".into()));
    driver.inject_event(BridgeEvent::UserInput(Bytes::from_static(b"ls\r")));
    driver.inject_server(FIRST, ServerMessage::SetPreferences(Preferences(preferences)));
    driver.inject_close(FIRST, Some(1000));

    run(&driver, ScriptedSentry::new()).await;

    assert!(driver.stopped());
    assert_eq!(driver.opened(), vec![FIRST]);
    assert_eq!(driver.opened_paths(), vec!["/ws".to_string()]);

    let mut expected = handshake();
    expected.push(ClientMessage::Input(Bytes::from_static(b"ls\r")));
    assert_eq!(driver.sent_messages(FIRST), expected);

    assert_eq!(driver.rendered(), b"hello");
    assert_eq!(driver.title().as_deref(), Some("vim | host"));
    assert!(driver.ui().contains(&UiAction::SetOption {
        name: "fontSize".into(),
        value: serde_json::json!(14),
    }));
    assert!(driver.ui().contains(&UiAction::ShowDialog(Dialog::Notice {
        message: "Closed".into(),
        is_error: false,
    })));
    insta::assert_snapshot!(driver.transient_messages().join(" | "), @"Connecting... | Connected");
}

#[tokio::test]
async fn handshake_and_title_wire_bytes() {
    let env = SimEnv::new();
    let config = ServerConfig::from_json(br#"{"socketPath":"/ws/1","service":"/svc"}"#).unwrap();
    let driver = SimDriver::new(env.clone())
        .with_config(Ok(config))
        .with_auto_open()
        .with_invariants(InvariantRegistry::standard());

    driver.inject_event(BridgeEvent::TransportMessage {
        transport: FIRST,
        data: Bytes::from_static(b"1host-1"),
    });
    driver.inject_event(BridgeEvent::TerminalTitle("host-1".into()));
    driver.inject_close(FIRST, Some(1000));

    run(&driver, ScriptedSentry::new()).await;

    assert_eq!(driver.opened_paths(), vec!["/ws/1".to_string()]);
    assert_eq!(driver.sent(FIRST), vec![
        Bytes::from_static(br#"1{"columns":80,"rows":24}"#),
        Bytes::from_static(br#"{"AuthToken":null,"ServicePath":"/svc"}"#),
    ]);
    assert!(driver.ui().contains(&UiAction::SetTitle("host-1".into())));
    assert_eq!(driver.title().as_deref(), Some("host-1 | host-1"));
}

#[tokio::test]
async fn abnormal_close_reconnects_after_interval() {
    let env = SimEnv::new();
    let driver = driver(&env);

    driver.inject_server(FIRST, ServerMessage::SetReconnect(ReconnectPolicy::from_secs(5.0)));
    driver.inject_close(FIRST, Some(1006));

    run(&driver, ScriptedSentry::new()).await;

    assert_eq!(driver.opened(), vec![FIRST, SECOND]);
    assert_eq!(driver.config_requests(), 1);
    assert_eq!(env.now(), SimInstant::at(Duration::from_secs(5)));
    assert_eq!(driver.sent_messages(SECOND), handshake());
    assert!(driver.ui().contains(&UiAction::ShowDialog(Dialog::Notice {
        message: "Connection closed abnormally".into(),
        is_error: true,
    })));
}

#[tokio::test]
async fn clean_close_without_policy_stays_closed() {
    let env = SimEnv::new();
    let driver = driver(&env);
    driver.inject_close(FIRST, None);

    run(&driver, ScriptedSentry::new()).await;

    assert_eq!(driver.opened(), vec![FIRST]);
    assert_eq!(env.now(), SimInstant::ZERO);
}

#[tokio::test]
async fn bootstrap_failure_shows_error_without_transport() {
    let env = SimEnv::new();
    let driver = SimDriver::new(env.clone())
        .with_config(Err(BootstrapError::Status("404 Not Found".into())))
        .with_invariants(InvariantRegistry::standard());

    run(&driver, ScriptedSentry::new()).await;

    assert!(driver.opened().is_empty());
    assert_eq!(driver.config_requests(), 1);
    assert!(driver.ui().contains(&UiAction::ShowDialog(Dialog::Notice {
        message: "Error from server: 404 Not Found".into(),
        is_error: true,
    })));
}

#[tokio::test]
async fn resize_burst_sends_final_size_once() {
    let env = SimEnv::new();
    let driver = driver(&env);
    driver.inject_event(BridgeEvent::Resize(WindowSize::new(100, 30)));
    driver.inject_event(BridgeEvent::Resize(WindowSize::new(120, 40)));

    run(&driver, ScriptedSentry::new()).await;

    let mut expected = handshake();
    expected.push(ClientMessage::Resize(WindowSize::new(120, 40)));
    assert_eq!(driver.sent_messages(FIRST), expected);
    assert_eq!(env.now(), SimInstant::at(Duration::from_millis(250)));
    assert!(driver.transient_messages().contains(&"120x40".to_string()));
}

#[tokio::test]
async fn receive_transfer_saves_file_and_blocks_input() {
    let env = SimEnv::new();
    let driver = driver(&env);
    let sentry = ScriptedSentry::new();
    let offer = FileDetails { name: "log.txt".into(), size: 6, files_remaining: 1, bytes_remaining: 6 };
    sentry
        .on_events(b"**\x18B00", vec![
            SentryEvent::Terminal(Bytes::from_static(b"rz\r")),
            SentryEvent::Detected(TransferDirection::Receive),
        ])
        .on_events(b"OFFER", vec![SentryEvent::Offer(offer.clone())])
        .on_events(b"DATA", vec![
            SentryEvent::Payload { bytes: Bytes::from_static(b"abc"), offset: 3 },
            SentryEvent::Payload { bytes: Bytes::from_static(b"def"), offset: 6 },
            SentryEvent::FileComplete,
            SentryEvent::SessionEnd,
        ]);

    driver.inject_server(FIRST, output(b"rz\r**\x18B00"));
    driver.inject_server(FIRST, output(b"OFFER"));
    driver.inject_event(BridgeEvent::UserInput(Bytes::from_static(b"x")));
    driver.inject_server(FIRST, output(b"DATA"));
    driver.inject_server(FIRST, output(b"$ "));

    run(&driver, sentry.clone()).await;

    assert_eq!(driver.saved(), vec![("log.txt".to_string(), Bytes::from_static(b"abcdef"))]);
    assert_eq!(driver.rendered(), b"rz\r$ ");
    assert_eq!(driver.sent_messages(FIRST), handshake());

    let ui = driver.ui();
    assert!(ui.contains(&UiAction::ShowDialog(Dialog::ReceiveFile(offer))));
    assert!(ui.contains(&UiAction::ShowTransferProgress(TransferProgress::new(3, 6))));
    assert!(ui.contains(&UiAction::SetInputEnabled(false)));
    assert!(driver.input_enabled());

    let calls = sentry.calls();
    assert!(calls.contains(&SentryCall::Confirm));
    assert!(calls.contains(&SentryCall::AcceptOffer));
}

#[tokio::test]
async fn send_transfer_uploads_selected_files() {
    let env = SimEnv::new();
    let driver = driver(&env);
    let sentry = ScriptedSentry::new();
    sentry.on_events(b"**\x18B01", vec![SentryEvent::Detected(TransferDirection::Send)]);

    driver.inject_server(FIRST, output(b"**\x18B01"));
    driver.inject_event(BridgeEvent::FilesSelected(vec![OutgoingFile {
        name: "a.txt".into(),
        data: Bytes::from_static(b"hello"),
    }]));

    run(&driver, sentry.clone()).await;

    let sent = driver.sent_messages(FIRST);
    assert_eq!(sent.last(), Some(&ClientMessage::Input(Bytes::from_static(b"hello"))));
    assert!(driver.ui().contains(&UiAction::ShowDialog(Dialog::SendFiles)));
    assert!(driver.ui().contains(&UiAction::ShowFileInfo(FileDetails {
        name: "a.txt".into(),
        size: 5,
        files_remaining: 1,
        bytes_remaining: 5,
    })));
    assert!(sentry.calls().contains(&SentryCall::SendFiles(vec!["a.txt".into()])));
}

#[tokio::test]
async fn decode_failure_fails_open() {
    let env = SimEnv::new();
    let driver = driver(&env);
    let sentry = ScriptedSentry::new();
    sentry
        .on_events(b"**\x18B01", vec![SentryEvent::Detected(TransferDirection::Send)])
        .fail_on(b"garbage", "bad header");

    driver.inject_server(FIRST, output(b"**\x18B01"));
    driver.inject_server(FIRST, output(b"garbage"));
    driver.inject_server(FIRST, output(b"ok"));
    driver.inject_event(BridgeEvent::UserInput(Bytes::from_static(b"y")));

    run(&driver, sentry.clone()).await;

    assert_eq!(driver.rendered(), b"ok");
    assert!(sentry.calls().contains(&SentryCall::Reset));
    assert_eq!(driver.sent_messages(FIRST).last(), Some(&ClientMessage::Input(Bytes::from_static(b"y"))));
}

#[tokio::test]
async fn false_detection_resumes_quietly() {
    let env = SimEnv::new();
    let driver = driver(&env);
    let sentry = ScriptedSentry::new();
    sentry
        .on_events(b"**\x18B00", vec![SentryEvent::Detected(TransferDirection::Receive)])
        .on_events(b"plain", vec![
            SentryEvent::Retracted,
            SentryEvent::Terminal(Bytes::from_static(b"plain")),
        ]);

    driver.inject_server(FIRST, output(b"**\x18B00"));
    driver.inject_server(FIRST, output(b"plain"));
    driver.inject_event(BridgeEvent::UserInput(Bytes::from_static(b"y")));

    run(&driver, sentry).await;

    assert_eq!(driver.rendered(), b"plain");
    assert!(!driver.transient_messages().iter().any(|text| text == TRANSFER_REJECTED_MESSAGE));
    assert_eq!(driver.sent_messages(FIRST).last(), Some(&ClientMessage::Input(Bytes::from_static(b"y"))));
}

#[tokio::test]
async fn connection_loss_aborts_transfer() {
    let env = SimEnv::new();
    let driver = driver(&env);
    let sentry = ScriptedSentry::new();
    sentry.on_events(b"**\x18B00", vec![SentryEvent::Detected(TransferDirection::Receive)]);

    driver.inject_server(FIRST, output(b"**\x18B00"));
    driver.inject_close(FIRST, Some(1006));

    run(&driver, sentry.clone()).await;

    assert!(sentry.calls().contains(&SentryCall::Reset));
    assert!(driver.ui().contains(&UiAction::ShowDialog(Dialog::Notice {
        message: "Connection closed abnormally".into(),
        is_error: true,
    })));
}
