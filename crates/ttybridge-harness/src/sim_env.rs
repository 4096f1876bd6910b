//! Virtual clock environment.
//!
//! Time only moves when a test advances it or when driver code sleeps, and a
//! sleep completes immediately after moving the clock. Timer-driven behavior
//! (reconnect, resize debounce) is therefore exact and instantaneous.

use std::{
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use ttybridge_core::Environment;

/// Instant on the virtual clock, measured from the start of the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Simulation start.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Instant `offset` after the simulation start.
    #[must_use]
    pub const fn at(offset: Duration) -> Self {
        Self(offset)
    }

    /// Time since the simulation start.
    #[must_use]
    pub const fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Environment backed by a shared virtual clock.
///
/// Clones share the clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    nanos: Arc<AtomicU64>,
}

impl SimEnv {
    /// Clock at [`SimInstant::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Move the clock forward to `instant`. Earlier instants are ignored.
    pub fn advance_to(&self, instant: SimInstant) {
        let target = u64::try_from(instant.since_start().as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_max(target, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(Duration::from_nanos(self.nanos.load(Ordering::SeqCst)))
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        other.advance(Duration::from_millis(250));

        assert_eq!(env.now(), SimInstant::at(Duration::from_millis(250)));
    }

    #[test]
    fn advance_to_never_goes_backwards() {
        let env = SimEnv::new();
        env.advance(Duration::from_secs(5));
        env.advance_to(SimInstant::at(Duration::from_secs(1)));

        assert_eq!(env.now().since_start(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn sleep_until_moves_clock_to_deadline() {
        let env = SimEnv::new();
        env.sleep_until(SimInstant::at(Duration::from_secs(3))).await;

        assert_eq!(env.now(), SimInstant::at(Duration::from_secs(3)));
    }

    #[test]
    fn instant_arithmetic() {
        let a = SimInstant::at(Duration::from_secs(2));
        let b = a + Duration::from_millis(500);

        assert_eq!(b - a, Duration::from_millis(500));
        assert_eq!(a - b, Duration::ZERO);
    }

    #[test]
    fn adding_past_the_end_saturates() {
        let late = SimInstant::at(Duration::from_secs(10)) + Duration::MAX;

        assert_eq!(late.since_start(), Duration::MAX);
    }
}
