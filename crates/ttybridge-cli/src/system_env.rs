//! Production Environment implementation using system time.
//!
//! `SystemEnv` reads the monotonic clock and sleeps on tokio timers, so
//! reconnect and resize timers fire in wall-clock time.

use std::time::Duration;

use ttybridge_core::Environment;

/// Production environment using system time.
///
/// Uses `std::time::Instant::now()` for time and `tokio::time::sleep()` for
/// async sleeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_millis(20), "Sleep should wait at least 20ms");
    }

    #[tokio::test]
    async fn sleep_until_past_deadline_returns() {
        let env = SystemEnv::new();
        let past = env.now();

        env.sleep(Duration::from_millis(5)).await;
        env.sleep_until(past).await;

        assert!(env.now() > past);
    }
}
