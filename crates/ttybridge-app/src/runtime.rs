//! Generic runtime for application orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Bridge`]: protocol state machines
//! - [`Driver`]: platform-specific I/O and the terminal surface

use ttybridge_core::Sentry;

use crate::{Bridge, BridgeAction, BridgeEvent, Driver};

/// Generic runtime that orchestrates Bridge and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `S`: Transfer sentry
pub struct Runtime<D, S>
where
    D: Driver,
{
    driver: D,
    bridge: Bridge<D::Instant, S>,
}

impl<D, S> Runtime<D, S>
where
    D: Driver,
    S: Sentry + Send,
{
    /// Create a new runtime with the given driver and bridge.
    pub fn new(driver: D, bridge: Bridge<D::Instant, S>) -> Self {
        Self { driver, bridge }
    }

    /// Run the main event loop until the bridge asks to quit.
    ///
    /// Each cycle:
    /// 1. Waits for an event from the driver, bounded by the bridge's next
    ///    timer deadline
    /// 2. Feeds it to the bridge, firing due timers
    /// 3. Executes the resulting actions through the driver
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        let now = self.driver.now();
        let actions = self.bridge.handle(BridgeEvent::Connect, now);
        let mut should_quit = self.execute(actions).await?;

        while !should_quit {
            should_quit = self.process_cycle().await?;
        }

        self.driver.stop();
        Ok(())
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the runtime should stop.
    async fn process_cycle(&mut self) -> Result<bool, D::Error> {
        let deadline = self.bridge.next_deadline();
        let event = self.driver.poll_event(deadline).await?;
        let now = self.driver.now();

        let mut actions = match event {
            Some(event) => self.bridge.handle(event, now),
            None => Vec::new(),
        };
        if self.bridge.next_deadline().is_some_and(|deadline| deadline <= now) {
            actions.extend(self.bridge.handle(BridgeEvent::Tick, now));
        }

        self.execute(actions).await
    }

    /// Execute bridge actions in order.
    ///
    /// Returns `true` if a quit was requested.
    async fn execute(&mut self, actions: Vec<BridgeAction>) -> Result<bool, D::Error> {
        let mut quit = false;
        for action in actions {
            match action {
                BridgeAction::FetchConfig => self.driver.fetch_config().await?,
                BridgeAction::OpenTransport { transport, socket_path } => {
                    self.driver.open_transport(transport, &socket_path).await?;
                },
                BridgeAction::Send { transport, data } => {
                    self.driver.send(transport, data).await?;
                },
                BridgeAction::CloseTransport { transport } => {
                    self.driver.close_transport(transport).await?;
                },
                BridgeAction::Ui(update) => update.apply(&mut self.driver),
                BridgeAction::Quit => quit = true,
            }
        }
        self.driver.flush()?;
        Ok(quit)
    }
}
