//! Deterministic simulation harness for ttybridge testing.
//!
//! Virtual-clock implementations of the Environment and Driver traits plus a
//! scripted transfer sentry, so the production [`ttybridge_app::Runtime`] can
//! be driven through full connection lifecycles without a network, a tty or
//! wall-clock time.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! bridge invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scripted_sentry;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    InputGating, Invariant, InvariantRegistry, InvariantResult, ReconnectOnlyWhenClosed,
    SingleLiveTransport, SystemSnapshot, Violation,
};
pub use scripted_sentry::{ScriptedSentry, SentryCall};
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
