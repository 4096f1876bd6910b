//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the terminal driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`ttybridge_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! Events are injected into a queue. The bootstrap request and transport opens
//! can be answered automatically; their answers jump the queue so scripted
//! server traffic lands on an open transport. When the queue is empty the
//! driver sleeps on the virtual clock until the runtime's next deadline, and
//! once nothing is left at all it requests a quit.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use ttybridge_app::{BridgeEvent, Dialog, Driver, Surface, UiAction};
use ttybridge_core::{
    BootstrapError, Environment, FileDetails, TransferProgress, TransportId,
};
use ttybridge_proto::{ClientMessage, ServerConfig, ServerMessage};

use crate::{
    invariants::{InvariantRegistry, SystemSnapshot},
    sim_env::{SimEnv, SimInstant},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Shared state for event injection and inspection.
struct SharedState {
    pending: VecDeque<BridgeEvent>,
    config_reply: Option<Result<ServerConfig, BootstrapError>>,
    auto_open: bool,
    config_requests: usize,
    opened: Vec<(TransportId, String)>,
    closed: Vec<TransportId>,
    outgoing: Vec<(TransportId, Bytes)>,
    ui: Vec<UiAction>,
    input_enabled: bool,
    dialog: Option<Dialog>,
    title: Option<String>,
    saved: Vec<(String, Bytes)>,
    stopped: bool,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            config_reply: None,
            auto_open: false,
            config_requests: 0,
            opened: Vec::new(),
            closed: Vec::new(),
            outgoing: Vec::new(),
            ui: Vec::new(),
            input_enabled: true,
            dialog: None,
            title: None,
            saved: Vec::new(),
            stopped: false,
        }
    }
}

/// Simulation driver for deterministic testing.
///
/// Clones share state, so a test keeps a handle after handing the driver to
/// a [`ttybridge_app::Runtime`].
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    env: SimEnv,
    invariants: Option<Arc<InvariantRegistry>>,
}

impl SimDriver {
    /// Create a driver on the given virtual clock.
    pub fn new(env: SimEnv) -> Self {
        Self { state: Arc::new(Mutex::new(SharedState::default())), env, invariants: None }
    }

    /// Enable invariant checking after every batch of actions.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(Arc::new(registry));
        self
    }

    /// Answer every bootstrap request with `reply`.
    #[must_use]
    pub fn with_config(self, reply: Result<ServerConfig, BootstrapError>) -> Self {
        self.state().config_reply = Some(reply);
        self
    }

    /// Report every transport as opened as soon as it is requested.
    #[must_use]
    pub fn with_auto_open(self) -> Self {
        self.state().auto_open = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Queue an event.
    pub fn inject_event(&self, event: BridgeEvent) {
        self.state().pending.push_back(event);
    }

    /// Queue a server message on `transport`.
    ///
    /// # Panics
    ///
    /// Panics if the message cannot be encoded.
    #[allow(clippy::expect_used)]
    pub fn inject_server(&self, transport: TransportId, message: ServerMessage) {
        let frame = message.into_frame().expect("invariant: scripted server messages encode");
        self.inject_event(BridgeEvent::TransportMessage { transport, data: frame.to_bytes() });
    }

    /// Queue a server-side close of `transport`.
    ///
    /// The transport counts as closed once the event is delivered.
    pub fn inject_close(&self, transport: TransportId, code: Option<u16>) {
        self.inject_event(BridgeEvent::TransportClosed { transport, code });
    }

    /// Check if there are pending events to process.
    pub fn has_pending(&self) -> bool {
        !self.state().pending.is_empty()
    }

    /// Number of bootstrap requests made.
    pub fn config_requests(&self) -> usize {
        self.state().config_requests
    }

    /// Transports opened, in order.
    pub fn opened(&self) -> Vec<TransportId> {
        self.state().opened.iter().map(|(id, _)| *id).collect()
    }

    /// Socket path requested for each opened transport.
    pub fn opened_paths(&self) -> Vec<String> {
        self.state().opened.iter().map(|(_, path)| path.clone()).collect()
    }

    /// Transports that are open and not closed by either side.
    pub fn live_transports(&self) -> Vec<TransportId> {
        let state = self.state();
        state
            .opened
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !state.closed.contains(id))
            .collect()
    }

    /// Raw bytes sent on `transport`.
    pub fn sent(&self, transport: TransportId) -> Vec<Bytes> {
        self.state()
            .outgoing
            .iter()
            .filter(|(id, _)| *id == transport)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Messages sent on `transport`, decoded as the server would.
    ///
    /// # Panics
    ///
    /// Panics if the client sent something the server cannot decode.
    #[allow(clippy::expect_used)]
    pub fn sent_messages(&self, transport: TransportId) -> Vec<ClientMessage> {
        self.sent(transport)
            .iter()
            .map(|data| ClientMessage::decode(data).expect("invariant: client sends valid messages"))
            .collect()
    }

    /// Every UI update applied, in order.
    pub fn ui(&self) -> Vec<UiAction> {
        self.state().ui.clone()
    }

    /// Texts of transient messages shown, in order.
    pub fn transient_messages(&self) -> Vec<String> {
        self.state()
            .ui
            .iter()
            .filter_map(|action| match action {
                UiAction::ShowTransientMessage { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated terminal output.
    pub fn rendered(&self) -> Vec<u8> {
        self.state()
            .ui
            .iter()
            .filter_map(|action| match action {
                UiAction::RenderBytes(bytes) => Some(&bytes[..]),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Whether local input is currently enabled.
    pub fn input_enabled(&self) -> bool {
        self.state().input_enabled
    }

    /// Dialog currently shown.
    pub fn dialog(&self) -> Option<Dialog> {
        self.state().dialog.clone()
    }

    /// Current window title.
    pub fn title(&self) -> Option<String> {
        self.state().title.clone()
    }

    /// Files handed to the user.
    pub fn saved(&self) -> Vec<(String, Bytes)> {
        self.state().saved.clone()
    }

    /// Whether the runtime stopped the driver.
    pub fn stopped(&self) -> bool {
        self.state().stopped
    }

    /// Observable state for invariant checking.
    ///
    /// The driver cannot see the transfer adapter, so
    /// [`SystemSnapshot::transfer_active`] is left unknown.
    pub fn snapshot(&self) -> SystemSnapshot {
        let live_transports = self.live_transports();
        let state = self.state();
        SystemSnapshot {
            input_enabled: state.input_enabled,
            dialog_shown: state.dialog.is_some(),
            transfer_active: None,
            live_transports,
            current_transport: None,
            connection_open: None,
            reconnect_pending: false,
        }
    }

    fn record(&self, action: UiAction) {
        self.state().ui.push(action);
    }
}

impl Surface for SimDriver {
    fn show_transient_message(&mut self, text: &str, duration: Option<Duration>) {
        self.record(UiAction::ShowTransientMessage { text: text.to_string(), duration });
    }

    fn show_dialog(&mut self, dialog: &Dialog) {
        let mut state = self.state();
        state.dialog = Some(dialog.clone());
        state.ui.push(UiAction::ShowDialog(dialog.clone()));
    }

    fn hide_dialog(&mut self) {
        let mut state = self.state();
        state.dialog = None;
        state.ui.push(UiAction::HideDialog);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        let mut state = self.state();
        state.input_enabled = enabled;
        state.ui.push(UiAction::SetInputEnabled(enabled));
    }

    fn render_bytes(&mut self, bytes: &[u8]) {
        self.record(UiAction::RenderBytes(Bytes::copy_from_slice(bytes)));
    }

    fn set_title(&mut self, title: &str) {
        let mut state = self.state();
        state.title = Some(title.to_string());
        state.ui.push(UiAction::SetTitle(title.to_string()));
    }

    fn set_option(&mut self, name: &str, value: &serde_json::Value) {
        self.record(UiAction::SetOption { name: name.to_string(), value: value.clone() });
    }

    fn show_file_info(&mut self, details: &FileDetails) {
        self.record(UiAction::ShowFileInfo(details.clone()));
    }

    fn show_transfer_progress(&mut self, progress: TransferProgress) {
        self.record(UiAction::ShowTransferProgress(progress));
    }

    fn save_file(&mut self, name: &str, data: &[u8]) {
        let data = Bytes::copy_from_slice(data);
        let mut state = self.state();
        state.saved.push((name.to_string(), data.clone()));
        state.ui.push(UiAction::SaveFile { name: name.to_string(), data });
    }

    fn watch_window(&mut self, enabled: bool) {
        self.record(UiAction::WatchWindow(enabled));
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_event(
        &mut self,
        deadline: Option<SimInstant>,
    ) -> Result<Option<BridgeEvent>, Self::Error> {
        let event = self.state().pending.pop_front();
        if let Some(event) = event {
            if let BridgeEvent::TransportClosed { transport, .. }
            | BridgeEvent::TransportFailed { transport, .. } = &event
            {
                self.state().closed.push(*transport);
            }
            return Ok(Some(event));
        }

        match deadline {
            Some(deadline) => {
                self.env.sleep_until(deadline).await;
                Ok(None)
            },
            None => {
                tracing::debug!("simulation script exhausted");
                Ok(Some(BridgeEvent::Quit))
            },
        }
    }

    async fn fetch_config(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.config_requests += 1;
        if let Some(reply) = state.config_reply.clone() {
            state.pending.push_front(BridgeEvent::ConfigFetched(reply));
        }
        Ok(())
    }

    async fn open_transport(
        &mut self,
        transport: TransportId,
        socket_path: &str,
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        if state.opened.iter().any(|(id, _)| *id == transport) {
            return Err(SimDriverError(format!("transport {transport} opened twice")));
        }
        state.opened.push((transport, socket_path.to_string()));
        if state.auto_open {
            state.pending.push_front(BridgeEvent::TransportOpened { transport });
        }
        Ok(())
    }

    async fn send(&mut self, transport: TransportId, data: Bytes) -> Result<(), Self::Error> {
        let mut state = self.state();
        if state.closed.contains(&transport) {
            return Err(SimDriverError(format!("send on closed transport {transport}")));
        }
        state.outgoing.push((transport, data));
        Ok(())
    }

    async fn close_transport(&mut self, transport: TransportId) -> Result<(), Self::Error> {
        self.state().closed.push(transport);
        Ok(())
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if let Some(registry) = &self.invariants {
            let snapshot = self.snapshot();
            registry.check_all(&snapshot).map_err(|violations| {
                let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
                SimDriverError(messages.join("; "))
            })?;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.state().stopped = true;
    }
}
