//! Typed payloads for JSON-carrying commands and the HTTP bootstrap.
//!
//! Field names follow the server's wire format exactly (`AuthToken`,
//! `socketPath`, ...), so renames live here and nowhere else.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal dimensions announced by the client.
///
/// Sent with [`crate::ClientCommand::ResizeTerminal`] when the transport opens
/// and after every (debounced) resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSize {
    /// Width in character cells.
    pub columns: u16,
    /// Height in character cells.
    pub rows: u16,
}

impl WindowSize {
    /// Create a window size.
    #[must_use]
    pub const fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// Authentication handshake sent as a bare JSON message right after open.
///
/// `auth_token` serializes as `null` when absent; the server decides whether
/// credentials are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Credential, if the page was served with one.
    #[serde(rename = "AuthToken")]
    pub auth_token: Option<String>,
    /// Service path selecting which command the server spawns.
    #[serde(rename = "ServicePath")]
    pub service_path: String,
}

/// Body of the `?q=config` bootstrap response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket path relative to the service root.
    #[serde(rename = "socketPath")]
    pub socket_path: String,
    /// Service path echoed back in the auth handshake.
    pub service: String,
}

impl ServerConfig {
    /// Parse a bootstrap response body.
    ///
    /// # Errors
    ///
    /// Returns the parser message if the body is not the expected JSON object.
    pub fn from_json(body: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(body).map_err(|e| e.to_string())
    }
}

/// Render-widget options pushed by the server (`'2'`).
///
/// Kept as a JSON map; the client applies each entry verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(pub Map<String, Value>);

impl Preferences {
    /// Iterate over `(option name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No options present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Auto-reconnect policy pushed by the server (`'3'`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Never reconnect automatically.
    #[default]
    Disabled,
    /// Reconnect this long after the connection closes.
    After(Duration),
}

/// Longest reconnect interval accepted from a server or the command line.
pub const MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

impl ReconnectPolicy {
    /// Build a policy from a seconds value. Zero, negative, non-finite or
    /// values above [`MAX_RECONNECT_INTERVAL`] disable reconnect.
    #[must_use]
    pub fn from_secs(secs: f64) -> Self {
        if secs <= 0.0 {
            return Self::Disabled;
        }
        match Duration::try_from_secs_f64(secs) {
            Ok(interval) if interval <= MAX_RECONNECT_INTERVAL => Self::After(interval),
            _ => Self::Disabled,
        }
    }

    /// Delay before reconnecting. `None` if disabled.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::After(interval) => Some(*interval),
        }
    }
}
