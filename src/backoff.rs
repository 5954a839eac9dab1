//! Exponential backoff policy for the reconnection supervisor.

use std::time::Duration;

use rand::Rng;

/// Attempts beyond this shift would overflow; the cap applies long before.
const MAX_SHIFT: u32 = 20;

/// Fraction of the raw delay used as the jitter range.
const JITTER_DENOM: u32 = 4;

/// Reconnect backoff: `min(base * 2^attempt + jitter, cap)`.
///
/// Jitter is uniform in `[0, raw/4]`, which spreads simultaneous
/// reconnections out while keeping successive delays non-decreasing
/// until the cap is reached.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Create a policy.
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        ReconnectPolicy {
            base,
            cap,
            max_attempts,
            attempt: 0,
        }
    }

    /// Attempts consumed since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The configured attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Reset the attempt counter; called when a connection reaches Ready.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// The deterministic delay for a given attempt, before jitter.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(MAX_SHIFT));
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Consume one attempt and return the jittered delay, or `None` once
    /// the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let raw = self.raw_delay(self.attempt);
        self.attempt += 1;

        let jitter_ms = (raw.as_millis() as u64) / u64::from(JITTER_DENOM);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        Some(raw.saturating_add(jitter).min(self.cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, cap_secs: u64, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(base_ms),
            Duration::from_secs(cap_secs),
            max_attempts,
        )
    }

    #[test]
    fn raw_delays_double_until_cap() {
        let p = policy(1000, 60, 10);
        assert_eq!(p.raw_delay(0), Duration::from_secs(1));
        assert_eq!(p.raw_delay(1), Duration::from_secs(2));
        assert_eq!(p.raw_delay(2), Duration::from_secs(4));
        assert_eq!(p.raw_delay(5), Duration::from_secs(32));
        assert_eq!(p.raw_delay(6), Duration::from_secs(60));
        assert_eq!(p.raw_delay(30), Duration::from_secs(60));
    }

    #[test]
    fn jittered_delays_stay_in_range() {
        let mut p = policy(1000, 60, 3);
        for attempt in 0..3 {
            let raw = p.raw_delay(attempt);
            let delay = p.next_delay().unwrap();
            assert!(delay >= raw, "attempt {attempt}: {delay:?} < {raw:?}");
            assert!(
                delay <= raw + raw / 4,
                "attempt {attempt}: {delay:?} > {:?}",
                raw + raw / 4
            );
        }
        assert_eq!(p.next_delay(), None);
    }

    #[test]
    fn delays_are_non_decreasing_until_cap() {
        let mut p = policy(1000, 60, 8);
        let mut last = Duration::ZERO;
        while let Some(delay) = p.next_delay() {
            assert!(delay >= last, "{delay:?} < {last:?}");
            last = delay;
        }
    }

    #[test]
    fn exhaustion_and_reset() {
        let mut p = policy(10, 60, 2);
        assert!(p.next_delay().is_some());
        assert!(p.next_delay().is_some());
        assert_eq!(p.attempt(), 2);
        assert_eq!(p.next_delay(), None);
        p.reset();
        assert_eq!(p.attempt(), 0);
        assert!(p.next_delay().is_some());
    }

    #[test]
    fn zero_attempts_never_retries() {
        let mut p = policy(1000, 60, 0);
        assert_eq!(p.next_delay(), None);
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let mut p = policy(1000, 2, 10);
        while let Some(delay) = p.next_delay() {
            assert!(delay <= Duration::from_secs(2));
        }
    }
}
