//! Error types for the ttybridge core.
//!
//! Two families reach the user: bootstrap failures (configuration fetch) and
//! transport failures. Everything else is recovered locally and logged.

use thiserror::Error;

use crate::connection::{ConnectionState, TransportId};

/// Failure of the `?q=config` bootstrap request.
///
/// The `Display` text is what the user sees in the error dialog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// Server answered with a non-success status.
    #[error("Error from server: {0}")]
    Status(String),

    /// The request itself failed (DNS, refused, TLS).
    #[error("Error from server: {0}")]
    Request(String),

    /// Body was not the expected JSON document.
    #[error("Error parsing server response")]
    Parse {
        /// Parser message, logged but not shown.
        reason: String,
    },
}

/// Errors from connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// Event refers to a transport that is no longer the live one
    #[error("stale transport {stale}: live transport is {live:?}")]
    StaleTransport {
        /// Transport named by the event
        stale: TransportId,
        /// Currently live transport, if any
        live: Option<TransportId>,
    },

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}
