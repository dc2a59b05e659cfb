//! Pause between direct-fetch retries
//!
//! The delay doubles with every timeout-class failure, stops growing at the
//! configured ceiling, and carries a random extra of up to a tenth of itself so
//! concurrent callers hammering the same slow origin drift apart.

use std::time::Duration;

use rand::Rng;

/// Doubling delay schedule for one fetch call
#[derive(Debug, Clone, Copy)]
pub struct RetryBackoff {
    base: Duration,
    ceiling: Duration,
}

impl RetryBackoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self { base, ceiling }
    }

    /// Delay before the next try, given how many tries have already failed
    pub fn delay_after(&self, failures: u32) -> Duration {
        let Some(doublings) = failures.checked_sub(1) else {
            return Duration::ZERO;
        };

        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        let delay = self
            .base
            .checked_mul(factor)
            .unwrap_or(self.ceiling)
            .min(self.ceiling);

        let spread = delay.as_micros() / 10;
        if spread == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..spread) as u64;
        delay + Duration::from_micros(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within_tenth(actual: Duration, expected_ms: u64) -> bool {
        let expected = Duration::from_millis(expected_ms);
        actual >= expected && actual <= expected + expected / 10
    }

    #[test]
    fn test_no_pause_before_first_try() {
        let backoff = RetryBackoff::new(Duration::from_millis(200), Duration::from_secs(5));
        assert_eq!(backoff.delay_after(0), Duration::ZERO);
    }

    #[test]
    fn test_default_fetch_schedule_doubles_until_ceiling() {
        let backoff = RetryBackoff::new(Duration::from_millis(200), Duration::from_secs(5));

        assert!(within_tenth(backoff.delay_after(1), 200));
        assert!(within_tenth(backoff.delay_after(2), 400));
        assert!(within_tenth(backoff.delay_after(4), 1600));
        assert!(within_tenth(backoff.delay_after(6), 5000));
        assert!(within_tenth(backoff.delay_after(u32::MAX), 5000));
    }

    #[test]
    fn test_zero_base_never_sleeps() {
        let backoff = RetryBackoff::new(Duration::ZERO, Duration::from_secs(5));
        assert_eq!(backoff.delay_after(3), Duration::ZERO);
    }
}
