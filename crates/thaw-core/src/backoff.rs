//! Capped Fibonacci backoff schedule for readiness polling.
//!
//! Seeded at `(0, 1)`, each step is the sum of the previous two, capped at
//! [`MAX_INTERVAL`]: `0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 89, ...`.
//! The poller sleeps for the steps after the two seeds, so its first wait is
//! one unit.

use std::time::Duration;

/// Largest step the schedule ever produces.
pub const MAX_INTERVAL: u64 = 89;

/// Infinite, non-decreasing sequence of backoff steps.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev1: u64,
    prev2: u64,
    unit: Duration,
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl FibonacciBackoff {
    /// Creates a schedule seeded at `(0, 1)` with one-second steps.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prev1: 0,
            prev2: 1,
            unit: Duration::from_secs(1),
        }
    }

    /// Sets the duration of one step.
    #[must_use]
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Duration of one step.
    #[must_use]
    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Returns the waits between status checks: the schedule after its seeds,
    /// converted to durations (`1, 2, 3, 5, ...` units).
    pub fn wait_intervals(self) -> impl Iterator<Item = Duration> {
        let unit = self.unit;
        self.skip(2).map(move |step| unit.saturating_mul(u32::try_from(step).unwrap_or(u32::MAX)))
    }
}

impl Iterator for FibonacciBackoff {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.prev1;
        let next = (self.prev1 + self.prev2).min(MAX_INTERVAL);
        self.prev1 = self.prev2;
        self.prev2 = next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sequence_from_seed() {
        let steps: Vec<u64> = FibonacciBackoff::new().take(15).collect();
        assert_eq!(
            steps,
            vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 89, 89, 89]
        );
    }

    #[test]
    fn waits_start_at_one_unit() {
        let waits: Vec<Duration> = FibonacciBackoff::new()
            .with_unit(Duration::from_millis(10))
            .wait_intervals()
            .take(5)
            .collect();
        assert_eq!(
            waits,
            [1, 2, 3, 5, 8].map(|n| Duration::from_millis(10 * n)).to_vec()
        );
    }

    #[test]
    fn default_unit_is_one_second() {
        assert_eq!(FibonacciBackoff::default().unit(), Duration::from_secs(1));
        let first = FibonacciBackoff::new().wait_intervals().next();
        assert_eq!(first, Some(Duration::from_secs(1)));
    }

    proptest! {
        #[test]
        fn non_decreasing_and_capped(len in 1usize..500) {
            let steps: Vec<u64> = FibonacciBackoff::new().take(len).collect();
            prop_assert!(steps.iter().all(|&s| s <= MAX_INTERVAL));
            prop_assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn reaches_cap_and_stays(extra in 0usize..1000) {
            let step = FibonacciBackoff::new().nth(11 + extra).unwrap();
            prop_assert_eq!(step, MAX_INTERVAL);
        }
    }
}
