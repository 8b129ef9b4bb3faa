//! Reconnect backoff policy.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter and an attempt budget.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max,
            max_attempts,
            current: initial,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    ///
    /// Grows as `min(current * 2 + jitter, max)`, where jitter is at most
    /// 30% of the current delay so simultaneous disconnects do not herd.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        let jitter = self.current.mul_f64(rand::thread_rng().gen_range(0.0..=0.3));
        self.current = (self.current * 2 + jitter).min(self.max);
        Some(self.current)
    }

    /// Back to the initial delay with a fresh attempt budget. Called on
    /// every successful open.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_are_monotonic_and_bounded() {
        let max = Duration::from_secs(30);
        let mut backoff = Backoff::new(Duration::from_millis(500), max, 20);
        let mut previous = Duration::ZERO;
        while let Some(delay) = backoff.next_delay() {
            assert!(delay >= previous, "backoff must never shrink");
            assert!(delay <= max, "backoff must never exceed the cap");
            previous = delay;
        }
        assert_eq!(backoff.attempts(), 20);
        // The cap is actually reached well within the budget.
        assert_eq!(previous, max);
    }

    #[test]
    fn test_budget_is_enforced() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 3);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_reset_restores_the_budget() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 1);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());

        backoff.reset();
        let first = backoff.next_delay().unwrap();
        // Doubling restarts from the initial delay, not the last one.
        assert!(first <= Duration::from_millis(260));
    }
}
