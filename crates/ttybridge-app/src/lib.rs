//! Application layer for ttybridge
//!
//! Pure bridge state machine and generic runtime connecting the protocol
//! state machines to a terminal surface, enabling deterministic simulation
//! testing with the same code that runs in production.
//!
//! # Components
//!
//! - [`Bridge`]: routes decoded server messages, user input and timers
//!   through the connection manager and transfer adapter
//! - [`Surface`]: the UI operations a frontend must provide
//! - [`Driver`]: trait for platform-specific I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod bridge;
mod driver;
mod event;
mod runtime;
mod surface;

pub use action::{BridgeAction, UiAction};
pub use bridge::{Bridge, TRANSFER_REJECTED_MESSAGE};
pub use driver::Driver;
pub use event::BridgeEvent;
pub use runtime::Runtime;
pub use surface::{Dialog, DialogChoice, Surface, describe_file, human_bytes};
