//! Property-based tests for the Bridge state machine.
//!
//! Tests verify that invariants hold under arbitrary event sequences,
//! including events from stale transports and garbage server messages.

use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;
use ttybridge_app::{Bridge, BridgeAction, BridgeEvent, UiAction};
use ttybridge_core::{ConnectionConfig, PassthroughSentry, Session, TransportId};
use ttybridge_proto::{ServerConfig, WindowSize};

/// Event template; transport ids are resolved against the live model.
#[derive(Debug, Clone)]
enum Op {
    Connect,
    Disconnect,
    Config,
    Open(u64),
    Message(u64, Vec<u8>),
    Close(u64, Option<u16>),
    Fail(u64),
    Input(Vec<u8>),
    Resize(u16, u16),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Connect),
        1 => Just(Op::Disconnect),
        1 => Just(Op::Config),
        2 => (0u64..2).prop_map(Op::Open),
        4 => (0u64..2, prop::collection::vec(any::<u8>(), 0..16)).prop_map(|(a, d)| Op::Message(a, d)),
        1 => (0u64..2, prop::option::of(prop_oneof![Just(1000u16), Just(1006u16)]))
            .prop_map(|(a, c)| Op::Close(a, c)),
        1 => (0u64..2).prop_map(Op::Fail),
        2 => prop::collection::vec(any::<u8>(), 1..8).prop_map(Op::Input),
        1 => (1u16..200, 1u16..80).prop_map(|(c, r)| Op::Resize(c, r)),
        1 => (0u64..2000).prop_map(Op::Advance),
    ]
}

struct Harness {
    bridge: Bridge<Duration, PassthroughSentry>,
    now: Duration,
    highest: u64,
    live: Vec<TransportId>,
    input_enabled: bool,
}

impl Harness {
    fn new() -> Self {
        Self {
            bridge: Bridge::new(Session::new(None), ConnectionConfig::default(), PassthroughSentry),
            now: Duration::ZERO,
            highest: 0,
            live: Vec::new(),
            input_enabled: true,
        }
    }

    fn aged(&self, age: u64) -> TransportId {
        TransportId::new(self.highest.saturating_sub(age))
    }

    fn event(&self, op: Op) -> BridgeEvent {
        match op {
            Op::Connect => BridgeEvent::Connect,
            Op::Disconnect => BridgeEvent::Disconnect,
            Op::Config => BridgeEvent::ConfigFetched(Ok(ServerConfig {
                socket_path: "/ws".into(),
                service: "svc".into(),
            })),
            Op::Open(age) => BridgeEvent::TransportOpened { transport: self.aged(age) },
            Op::Message(age, data) => {
                BridgeEvent::TransportMessage { transport: self.aged(age), data: Bytes::from(data) }
            },
            Op::Close(age, code) => BridgeEvent::TransportClosed { transport: self.aged(age), code },
            Op::Fail(age) => {
                BridgeEvent::TransportFailed { transport: self.aged(age), reason: "reset".into() }
            },
            Op::Input(data) => BridgeEvent::UserInput(Bytes::from(data)),
            Op::Resize(c, r) => BridgeEvent::Resize(WindowSize::new(c, r)),
            Op::Advance(_) => BridgeEvent::Tick,
        }
    }

    fn step(&mut self, op: Op) {
        if let Op::Advance(ms) = op {
            self.now += Duration::from_millis(ms);
        }
        let closing = match &op {
            Op::Close(age, _) | Op::Fail(age) => Some(self.aged(*age)),
            _ => None,
        };
        let was_current = closing.is_some_and(|t| self.bridge.connection().is_current(t));

        let event = self.event(op);
        let actions = self.bridge.handle(event, self.now);

        if was_current {
            self.live.retain(|t| Some(*t) != closing);
        }
        for action in &actions {
            match action {
                BridgeAction::OpenTransport { transport, .. } => {
                    self.highest = transport.get();
                    self.live.push(*transport);
                },
                BridgeAction::CloseTransport { transport } => self.live.retain(|t| t != transport),
                BridgeAction::Send { transport, .. } => {
                    assert!(self.bridge.connection().is_current(*transport));
                },
                BridgeAction::Ui(UiAction::SetInputEnabled(enabled)) => {
                    self.input_enabled = *enabled;
                },
                _ => {},
            }
        }
    }

    fn check(&self) {
        assert!(self.live.len() <= 1, "live transports: {:?}", self.live);
        assert_eq!(self.input_enabled, self.bridge.input_enabled());
        assert_eq!(
            self.bridge.input_enabled(),
            self.bridge.dialog().is_none() && !self.bridge.transfer().is_active()
        );
    }
}

proptest! {
    #[test]
    fn prop_bridge_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut harness = Harness::new();
        for op in ops {
            harness.step(op);
            harness.check();
        }
    }

    #[test]
    fn prop_output_renders_verbatim(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut harness = Harness::new();
        harness.step(Op::Connect);
        harness.step(Op::Config);
        harness.step(Op::Open(0));

        let mut message = vec![b'0'];
        message.extend_from_slice(&data);
        let actions = harness.bridge.handle(
            BridgeEvent::TransportMessage { transport: harness.aged(0), data: Bytes::from(message) },
            harness.now,
        );

        prop_assert_eq!(actions, vec![BridgeAction::Ui(UiAction::RenderBytes(Bytes::from(data)))]);
    }
}
