//! Connection lifecycle state machine.
//!
//! Owns the single live transport, the bootstrap fetch, the auth handshake,
//! resize debouncing and the auto-reconnect timer. Uses the action pattern:
//! methods take time as input and return actions for the driver to execute.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ connect ┌────────────┐  opened   ┌──────┐
//! │ Idle │────────>│ Connecting │──────────>│ Open │
//! └──────┘         └────────────┘           └──────┘
//!                     │     ^                  │ │
//!       config error  │     │ reconnect timer  │ │ disconnect
//!                     ↓     │                  │ ↓
//!                  ┌────────────┐   closed     │ ┌─────────┐
//!                  │   Closed   │<─────────────┘ │ Closing │
//!                  └────────────┘<───────────────└─────────┘
//! ```
//!
//! Every transport gets a fresh [`TransportId`]. Events carrying any other id
//! are stale and rejected, which keeps at most one transport live even when a
//! reconnect races a late close from its predecessor.

use std::{
    fmt,
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use ttybridge_proto::{
    ClientMessage, MAX_RECONNECT_INTERVAL, ReconnectPolicy, ServerConfig, WindowSize,
};

use crate::{
    debounce::Debounce,
    error::{BootstrapError, ConnectionError},
    session::Session,
};

/// Quiet period before a resize is reported to the server.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(250);

/// How long the "Connected" flash stays up.
pub const DEFAULT_CONNECTED_FLASH: Duration = Duration::from_millis(500);

/// How long the `COLSxROWS` flash stays up after a resize.
pub const DEFAULT_RESIZE_FLASH: Duration = Duration::from_millis(500);

/// WebSocket close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Dialog text for a normal closure.
pub const CLEAN_CLOSE_REASON: &str = "Closed";

/// Dialog text for every other closure.
pub const ABNORMAL_CLOSE_REASON: &str = "Connection closed abnormally";

/// Flash shown while a transport is being opened.
pub const CONNECTING_MESSAGE: &str = "Connecting...";

/// Flash shown once the transport is open.
pub const CONNECTED_MESSAGE: &str = "Connected";

/// Identity of one transport instance.
///
/// Monotonically increasing per [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// User-visible notices produced by the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    /// Transient overlay. `None` duration stays until replaced.
    Flash {
        /// Text to show
        text: String,
        /// Auto-hide delay
        duration: Option<Duration>,
    },
    /// Blocking dialog with a reconnect choice.
    Dialog {
        /// Text to show
        message: String,
        /// Render as an error
        is_error: bool,
    },
    /// Dismiss any blocking dialog.
    HideDialog,
}

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Fetch the bootstrap configuration and report it via
    /// [`ConnectionManager::handle_config`].
    FetchConfig,

    /// Open a transport to `socket_path` and report its events under
    /// `transport`.
    OpenTransport {
        /// Id the driver must tag events with
        transport: TransportId,
        /// Path relative to the service root
        socket_path: String,
    },

    /// Encode and send a message on the transport.
    Send {
        /// Target transport
        transport: TransportId,
        /// Message to send
        message: ClientMessage,
    },

    /// Close the transport.
    CloseTransport {
        /// Transport to close
        transport: TransportId,
    },

    /// Start or stop observing window resizes and unload.
    WatchWindow(bool),

    /// Show or hide something in the UI.
    Notify(ConnectionNotice),
}

impl ConnectionAction {
    fn flash(text: impl Into<String>, duration: Option<Duration>) -> Self {
        Self::Notify(ConnectionNotice::Flash { text: text.into(), duration })
    }
}

/// Connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing attempted yet
    Idle,
    /// Fetching configuration or waiting for the transport to open
    Connecting,
    /// Transport open and authenticated
    Open,
    /// Local disconnect requested, waiting for the transport to close
    Closing,
    /// No live transport
    Closed {
        /// Text shown to the user
        reason: String,
        /// Whether the closure was an error
        is_error: bool,
    },
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Quiet period before a resize is sent
    pub resize_debounce: Duration,
    /// Auto-hide delay for the "Connected" flash
    pub connected_flash: Duration,
    /// Auto-hide delay for the resize flash
    pub resize_flash: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            connected_flash: DEFAULT_CONNECTED_FLASH,
            resize_flash: DEFAULT_RESIZE_FLASH,
        }
    }
}

/// Connection state machine
///
/// Pure state machine: no I/O and no stored clock. Generic over `Instant` to
/// support both real time and virtual time for deterministic testing.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    state: ConnectionState,
    config: ConnectionConfig,
    session: Session,
    /// Live transport. Kept through `Closing` so its close event matches.
    transport: Option<TransportId>,
    next_transport: u64,
    awaiting_config: bool,
    watching_window: bool,
    /// Set by a local disconnect; suppresses auto-reconnect.
    user_closed: bool,
    reconnect_at: Option<I>,
    window_size: WindowSize,
    resize: Debounce<I, WindowSize>,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Create a manager in [`ConnectionState::Idle`].
    pub fn new(session: Session, config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Idle,
            config,
            session,
            transport: None,
            next_transport: 1,
            awaiting_config: false,
            watching_window: false,
            user_closed: false,
            reconnect_at: None,
            window_size: WindowSize::default(),
            resize: Debounce::new(),
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// True while a transport is open and authenticated.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Session data.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session data, for server-pushed titles.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Live transport, if any.
    #[must_use]
    pub fn transport(&self) -> Option<TransportId> {
        self.transport
    }

    /// Whether `transport` is the live one.
    #[must_use]
    pub fn is_current(&self, transport: TransportId) -> bool {
        self.transport == Some(transport)
    }

    /// Last known terminal dimensions.
    #[must_use]
    pub fn window_size(&self) -> WindowSize {
        self.window_size
    }

    /// Pending reconnect deadline.
    #[must_use]
    pub fn reconnect_deadline(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Earliest instant at which [`ConnectionManager::tick`] has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<I> {
        match (self.reconnect_at, self.resize.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Set the size reported in the handshake without debouncing.
    ///
    /// Used by drivers to seed the initial terminal dimensions.
    pub fn set_window_size(&mut self, size: WindowSize) {
        self.window_size = size;
    }

    /// Begin connecting.
    ///
    /// Cancels any pending reconnect and closes a live transport first, then
    /// either fetches configuration or opens a transport directly when the
    /// session is already configured. Does nothing while a configuration
    /// fetch is outstanding.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.awaiting_config && self.state == ConnectionState::Connecting {
            tracing::debug!("configuration fetch already in flight");
            return Vec::new();
        }
        self.reconnect_at = None;
        self.user_closed = false;

        let mut actions = Vec::new();
        if let Some(old) = self.transport.take() {
            tracing::debug!(transport = %old, "closing previous transport before reconnect");
            actions.push(ConnectionAction::CloseTransport { transport: old });
        }
        actions.extend(self.unwatch_window());

        self.state = ConnectionState::Connecting;
        if self.session.is_configured() {
            actions.extend(self.open_transport());
        } else {
            self.awaiting_config = true;
            actions.push(ConnectionAction::FetchConfig);
        }
        actions
    }

    /// Apply the bootstrap response.
    ///
    /// A failure is terminal: the error dialog is shown and no reconnect is
    /// scheduled.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no fetch is outstanding
    pub fn handle_config(
        &mut self,
        result: Result<ServerConfig, BootstrapError>,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !self.awaiting_config || self.state != ConnectionState::Connecting {
            return Err(self.invalid("handle_config"));
        }
        self.awaiting_config = false;

        match result {
            Ok(config) => {
                tracing::debug!(socket_path = %config.socket_path, service = %config.service, "configuration received");
                self.session.configure(config);
                Ok(self.open_transport())
            },
            Err(err) => {
                tracing::error!(error = ?err, "configuration bootstrap failed");
                let message = err.to_string();
                self.state = ConnectionState::Closed { reason: message.clone(), is_error: true };
                Ok(vec![ConnectionAction::Notify(ConnectionNotice::Dialog {
                    message,
                    is_error: true,
                })])
            },
        }
    }

    /// Transport finished its opening handshake.
    ///
    /// Sends the current window size, then the auth message, and starts
    /// watching the window.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::StaleTransport` if `transport` is not the live one
    /// - `ConnectionError::InvalidState` if not in `Connecting`
    pub fn handle_open(
        &mut self,
        transport: TransportId,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.check_current(transport)?;
        if self.state != ConnectionState::Connecting {
            return Err(self.invalid("handle_open"));
        }
        let Some(auth) = self.session.auth_request() else {
            return Err(self.invalid("handle_open"));
        };

        tracing::info!(%transport, "connection established");
        self.state = ConnectionState::Open;
        // The handshake carries the freshest size.
        self.resize.cancel();

        let mut actions = vec![ConnectionAction::flash(
            CONNECTED_MESSAGE,
            Some(self.config.connected_flash),
        )];
        actions.push(ConnectionAction::Send {
            transport,
            message: ClientMessage::Resize(self.window_size),
        });
        actions.push(ConnectionAction::Send { transport, message: ClientMessage::Auth(auth) });
        self.watching_window = true;
        actions.push(ConnectionAction::WatchWindow(true));
        Ok(actions)
    }

    /// Transport closed with an optional WebSocket close code.
    ///
    /// Code 1000 is a clean closure; anything else, including no code at all,
    /// is abnormal. Schedules a reconnect when the policy allows and the
    /// closure was not requested locally.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::StaleTransport` if `transport` is not the live one
    pub fn handle_close(
        &mut self,
        transport: TransportId,
        code: Option<u16>,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.check_current(transport)?;
        let (reason, is_error) = if code == Some(NORMAL_CLOSURE) {
            (CLEAN_CLOSE_REASON, false)
        } else {
            (ABNORMAL_CLOSE_REASON, true)
        };
        tracing::info!(%transport, ?code, "connection closed");
        Ok(self.enter_closed(reason.to_string(), is_error, now))
    }

    /// Transport failed without a close handshake.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::StaleTransport` if `transport` is not the live one
    pub fn handle_error(
        &mut self,
        transport: TransportId,
        error: &ConnectionError,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.check_current(transport)?;
        tracing::warn!(%transport, %error, "transport failed");
        Ok(self.enter_closed(ABNORMAL_CLOSE_REASON.to_string(), true, now))
    }

    /// Close locally. No reconnect follows.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.reconnect_at = None;
        self.user_closed = true;
        self.awaiting_config = false;
        self.resize.cancel();

        match (self.transport, &self.state) {
            (Some(transport), ConnectionState::Connecting | ConnectionState::Open) => {
                self.state = ConnectionState::Closing;
                vec![ConnectionAction::CloseTransport { transport }]
            },
            (_, ConnectionState::Closing | ConnectionState::Closed { .. }) => Vec::new(),
            _ => {
                self.state =
                    ConnectionState::Closed { reason: "Disconnected".to_string(), is_error: false };
                Vec::new()
            },
        }
    }

    /// Tear everything down immediately without waiting for close events.
    pub fn dispose(&mut self) -> Vec<ConnectionAction> {
        self.reconnect_at = None;
        self.user_closed = true;
        self.awaiting_config = false;
        self.resize.cancel();

        let mut actions = Vec::new();
        if let Some(transport) = self.transport.take() {
            actions.push(ConnectionAction::CloseTransport { transport });
        }
        actions.extend(self.unwatch_window());
        self.state = ConnectionState::Closed { reason: "Disposed".to_string(), is_error: false };
        actions
    }

    /// Send a message if the transport is open.
    ///
    /// Returns nothing while not open; messages are not queued.
    #[must_use]
    pub fn send(&self, message: ClientMessage) -> Option<ConnectionAction> {
        match (self.transport, &self.state) {
            (Some(transport), ConnectionState::Open) => {
                Some(ConnectionAction::Send { transport, message })
            },
            _ => {
                tracing::trace!("dropping outbound message: connection not open");
                None
            },
        }
    }

    /// Record a new window size. Reported after the debounce period.
    pub fn request_resize(&mut self, size: WindowSize, now: I) {
        self.window_size = size;
        self.resize.schedule(now + self.config.resize_debounce, size);
    }

    /// Replace the reconnect policy.
    ///
    /// A timer that is already pending keeps its deadline.
    pub fn set_reconnect(&mut self, policy: ReconnectPolicy) {
        tracing::info!(?policy, "reconnect policy updated");
        self.session.set_reconnect(policy);
    }

    /// Fire expired timers.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        if let Some(size) = self.resize.fire(now) {
            if let Some(send) = self.send(ClientMessage::Resize(size)) {
                actions.push(send);
                actions.push(ConnectionAction::flash(
                    format!("{}x{}", size.columns, size.rows),
                    Some(self.config.resize_flash),
                ));
            }
        }

        if self.reconnect_at.is_some_and(|deadline| deadline <= now) {
            tracing::info!("attempting to reconnect");
            actions.extend(self.connect());
        }

        actions
    }

    fn open_transport(&mut self) -> Vec<ConnectionAction> {
        let Some(socket_path) = self.session.socket_path().map(str::to_string) else {
            return Vec::new();
        };
        let transport = TransportId::new(self.next_transport);
        self.next_transport += 1;
        self.transport = Some(transport);

        tracing::debug!(%transport, %socket_path, "opening transport");
        vec![
            ConnectionAction::Notify(ConnectionNotice::HideDialog),
            ConnectionAction::flash(CONNECTING_MESSAGE, None),
            ConnectionAction::OpenTransport { transport, socket_path },
        ]
    }

    fn enter_closed(&mut self, reason: String, is_error: bool, now: I) -> Vec<ConnectionAction> {
        self.transport = None;
        self.resize.cancel();

        let mut actions: Vec<_> = self.unwatch_window().into_iter().collect();
        actions.push(ConnectionAction::Notify(ConnectionNotice::Dialog {
            message: reason.clone(),
            is_error,
        }));
        self.state = ConnectionState::Closed { reason, is_error };

        if !self.user_closed {
            if let Some(interval) = self.session.reconnect().interval() {
                if interval > MAX_RECONNECT_INTERVAL {
                    tracing::warn!(?interval, "reconnect interval clamped");
                }
                let interval = interval.min(MAX_RECONNECT_INTERVAL);
                tracing::info!(?interval, "reconnect scheduled");
                // Replaces any earlier deadline.
                self.reconnect_at = Some(now + interval);
            }
        }
        actions
    }

    fn unwatch_window(&mut self) -> Option<ConnectionAction> {
        std::mem::take(&mut self.watching_window).then_some(ConnectionAction::WatchWindow(false))
    }

    fn check_current(&self, transport: TransportId) -> Result<(), ConnectionError> {
        if self.is_current(transport) {
            Ok(())
        } else {
            Err(ConnectionError::StaleTransport { stale: transport, live: self.transport })
        }
    }

    fn invalid(&self, operation: &str) -> ConnectionError {
        ConnectionError::InvalidState { state: self.state.clone(), operation: operation.to_string() }
    }
}
