//! Per-connection configuration and server-pushed state.

use ttybridge_proto::{AuthRequest, ReconnectPolicy, ServerConfig};

/// What the client knows about the remote terminal service.
///
/// Starts unconfigured; [`Session::configure`] fills in the socket path and
/// service from the bootstrap response. Configuration survives reconnects so
/// the bootstrap request is made at most once per successful fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    config: Option<ServerConfig>,
    auth_token: Option<String>,
    reconnect: ReconnectPolicy,
    title: Option<String>,
}

impl Session {
    /// Unconfigured session carrying an optional auth token.
    pub fn new(auth_token: Option<String>) -> Self {
        Self { auth_token, ..Self::default() }
    }

    /// Start with a reconnect policy instead of waiting for the server to
    /// push one.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Record the bootstrap response.
    pub fn configure(&mut self, config: ServerConfig) {
        self.config = Some(config);
    }

    /// Whether a bootstrap response has been recorded.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Path of the WebSocket endpoint relative to the service root.
    #[must_use]
    pub fn socket_path(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.socket_path.as_str())
    }

    /// Service identifier echoed back during auth.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.service.as_str())
    }

    /// Auth message for a freshly opened transport.
    ///
    /// `None` until configured.
    #[must_use]
    pub fn auth_request(&self) -> Option<AuthRequest> {
        self.config.as_ref().map(|c| AuthRequest {
            auth_token: self.auth_token.clone(),
            service_path: c.service.clone(),
        })
    }

    /// Current reconnect policy.
    #[must_use]
    pub fn reconnect(&self) -> ReconnectPolicy {
        self.reconnect
    }

    /// Replace the reconnect policy.
    pub fn set_reconnect(&mut self, policy: ReconnectPolicy) {
        self.reconnect = policy;
    }

    /// Window title pushed by the server.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Record the server-pushed window title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Compose a terminal-emitted title with the server title.
    ///
    /// Produces `"<terminal> | <server>"`, or just the terminal title while no
    /// server title is known.
    #[must_use]
    pub fn compose_title(&self, terminal_title: &str) -> String {
        match &self.title {
            Some(title) => format!("{terminal_title} | {title}"),
            None => terminal_title.to_string(),
        }
    }
}
