//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. Each frontend implements it to provide platform-specific
//! I/O, while the generic [`crate::Runtime`] handles all orchestration.

use std::{
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

use bytes::Bytes;
use ttybridge_core::TransportId;

use crate::{BridgeEvent, Surface};

/// Abstracts I/O operations for the runtime.
///
/// Operations that complete asynchronously (the bootstrap request, opening a
/// transport) report their outcome later as a [`BridgeEvent`] from
/// [`Driver::poll_event`]; the futures here only cover starting them.
///
/// # Implementations
///
/// - **Terminal**: crossterm for the local tty, reqwest and tokio-tungstenite
///   for the network
/// - **Simulation**: scripted events and recorded output on a virtual clock
pub trait Driver: Surface + Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Wait for the next event.
    ///
    /// Returns `None` once `deadline` passes without an event, so the runtime
    /// can fire timers.
    fn poll_event(
        &mut self,
        deadline: Option<Self::Instant>,
    ) -> impl Future<Output = Result<Option<BridgeEvent>, Self::Error>> + Send;

    /// Start the bootstrap request. Reports [`BridgeEvent::ConfigFetched`].
    fn fetch_config(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Start opening a transport. Reports its events tagged with `transport`.
    fn open_transport(
        &mut self,
        transport: TransportId,
        socket_path: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns an error only for driver failures. A transport that went away
    /// reports [`BridgeEvent::TransportClosed`] instead.
    fn send(
        &mut self,
        transport: TransportId,
        data: Bytes,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close a transport.
    fn close_transport(
        &mut self,
        transport: TransportId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Push buffered UI output.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface can no longer be written.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Stop the driver and clean up resources.
    fn stop(&mut self);
}
