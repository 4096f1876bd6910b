//! Terminal client for ttybridge.
//!
//! A thin shell over [`ttybridge_app::Driver`] that connects the local tty to
//! a remote terminal service. All orchestration logic lives in the generic
//! [`ttybridge_app::Runtime`].
//!
//! This crate only handles I/O: the bootstrap request, the WebSocket
//! transport, raw-mode keyboard input and writing output to the tty.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod keys;
pub mod system_env;
pub mod terminal;
pub mod transport;
pub mod zmodem;

pub use config::{ConfigError, Endpoints};
pub use system_env::SystemEnv;
pub use terminal::{TerminalDriver, TerminalError};
pub use ttybridge_app::{Bridge, BridgeEvent, Driver, Runtime};
pub use zmodem::ZmodemSentry;
