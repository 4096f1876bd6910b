//! Environment abstraction for deterministic testing.
//!
//! Decouples drivers from the system clock. Production uses real time and
//! tokio timers; simulation uses a virtual clock that only moves when the test
//! advances it, so reconnect and debounce timers can be driven exactly.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use a virtual instant.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps. State machines receive `now` as a parameter
    /// and report their next deadline instead.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Sleep until `deadline`, returning immediately if it already passed.
    fn sleep_until(
        &self,
        deadline: Self::Instant,
    ) -> impl std::future::Future<Output = ()> + Send {
        let now = self.now();
        let remaining = if deadline > now { deadline - now } else { Duration::ZERO };
        self.sleep(remaining)
    }
}
