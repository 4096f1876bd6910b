//! Trailing-edge debounce timer.

/// Holds the latest value until a quiet period has elapsed.
///
/// Each [`Debounce::schedule`] replaces both the pending value and the
/// deadline, so only the last value of a burst is ever released.
#[derive(Debug, Clone)]
pub struct Debounce<I, T> {
    pending: Option<(I, T)>,
}

impl<I: Copy + Ord, T> Default for Debounce<I, T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<I: Copy + Ord, T> Debounce<I, T> {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending value and push the deadline out.
    pub fn schedule(&mut self, deadline: I, value: T) {
        self.pending = Some((deadline, value));
    }

    /// Drop the pending value without releasing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Release the pending value if its deadline has passed.
    pub fn fire(&mut self, now: I) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if deadline <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    /// Deadline of the pending value.
    #[must_use]
    pub fn deadline(&self) -> Option<I> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_of_burst_wins() {
        let mut debounce = Debounce::new();
        debounce.schedule(10u64, "a");
        debounce.schedule(20u64, "b");
        debounce.schedule(30u64, "c");

        assert_eq!(debounce.fire(25), None);
        assert_eq!(debounce.fire(30), Some("c"));
        assert_eq!(debounce.fire(100), None);
    }

    #[test]
    fn cancel_drops_pending() {
        let mut debounce = Debounce::new();
        debounce.schedule(5u64, 1);
        debounce.cancel();

        assert_eq!(debounce.deadline(), None);
        assert_eq!(debounce.fire(10), None);
    }
}
