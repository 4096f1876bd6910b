//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Local input is enabled exactly when nothing blocks it.
///
/// A blocking dialog always disables input. When the transfer state is
/// observable, an active session disables it too, and input must be enabled
/// otherwise.
pub struct InputGating;

impl Invariant for InputGating {
    fn name(&self) -> &'static str {
        "input_gating"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.input_enabled && state.dialog_shown {
            return Err(Violation {
                invariant: self.name(),
                message: "input enabled while a dialog is shown".to_string(),
            });
        }
        if let Some(transfer_active) = state.transfer_active {
            let expected = !transfer_active && !state.dialog_shown;
            if state.input_enabled != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "input_enabled={} but dialog_shown={} transfer_active={}",
                        state.input_enabled, state.dialog_shown, transfer_active
                    ),
                });
            }
        }
        Ok(())
    }
}

/// At most one transport is live, and it is the one the manager tracks.
pub struct SingleLiveTransport;

impl Invariant for SingleLiveTransport {
    fn name(&self) -> &'static str {
        "single_live_transport"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.live_transports.len() > 1 {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} live transports: {:?}", state.live_transports.len(), state.live_transports),
            });
        }
        if let (Some(live), Some(current)) = (state.live_transports.first(), state.current_transport)
        {
            if *live != current {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("driver has {live} live but manager tracks {current}"),
                });
            }
        }
        Ok(())
    }
}

/// A reconnect is only ever pending while no transport exists.
pub struct ReconnectOnlyWhenClosed;

impl Invariant for ReconnectOnlyWhenClosed {
    fn name(&self) -> &'static str {
        "reconnect_only_when_closed"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.reconnect_pending
            && (state.current_transport.is_some() || state.connection_open == Some(true))
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "reconnect pending with transport {:?} open={:?}",
                    state.current_transport, state.connection_open
                ),
            });
        }
        Ok(())
    }
}
