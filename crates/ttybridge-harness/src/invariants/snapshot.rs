//! Observable system state for invariant checks.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use ttybridge_app::Bridge;
use ttybridge_core::{ConnectionState, Sentry, TransportId};

/// Observable state at one point in a simulation.
///
/// Fields the observer cannot see are `None` and skipped by the checks.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Local input forwarded to the transport
    pub input_enabled: bool,
    /// A blocking dialog is shown
    pub dialog_shown: bool,
    /// A transfer session exists
    pub transfer_active: Option<bool>,
    /// Transports opened and not yet closed, as seen by the driver
    pub live_transports: Vec<TransportId>,
    /// Transport the connection manager considers live
    pub current_transport: Option<TransportId>,
    /// Connection manager is in the open state
    pub connection_open: Option<bool>,
    /// A reconnect timer is pending
    pub reconnect_pending: bool,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            input_enabled: true,
            dialog_shown: false,
            transfer_active: None,
            live_transports: Vec::new(),
            current_transport: None,
            connection_open: None,
            reconnect_pending: false,
        }
    }
}

impl SystemSnapshot {
    /// Capture a bridge together with the driver's view of live transports.
    pub fn from_bridge<I, S>(bridge: &Bridge<I, S>, live_transports: Vec<TransportId>) -> Self
    where
        I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
        S: Sentry,
    {
        let connection = bridge.connection();
        Self {
            input_enabled: bridge.input_enabled(),
            dialog_shown: bridge.dialog().is_some(),
            transfer_active: Some(bridge.transfer().is_active()),
            live_transports,
            current_transport: connection.transport(),
            connection_open: Some(*connection.state() == ConnectionState::Open),
            reconnect_pending: connection.reconnect_deadline().is_some(),
        }
    }
}
