//! Core state machines for ttybridge.
//!
//! Everything here follows the Sans-IO action pattern: methods take the
//! current instant as a parameter and return actions for a driver to execute.
//! Nothing in this crate touches a socket, a clock or a timer directly.
//!
//! # Components
//!
//! - [`ConnectionManager`]: transport lifecycle, auth handshake, reconnect and
//!   resize scheduling
//! - [`TransferAdapter`]: diverts terminal output into a transfer session
//!   detected by a [`Sentry`] and back
//! - [`Session`]: per-connection configuration and server-pushed state
//! - [`Environment`]: clock abstraction for drivers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
mod debounce;
pub mod env;
pub mod error;
pub mod sentry;
mod session;
pub mod transfer;

pub use connection::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionNotice, ConnectionState,
    TransportId,
};
pub use debounce::Debounce;
pub use env::Environment;
pub use error::{BootstrapError, ConnectionError};
pub use sentry::{
    DecodeError, FileDetails, OutgoingFile, PassthroughSentry, Sentry, SentryEvent, SentryResult,
    TransferDirection,
};
pub use session::Session;
pub use transfer::{TransferAction, TransferAdapter, TransferPhase, TransferProgress, TransferSession};
