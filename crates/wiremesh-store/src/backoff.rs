//! Jittered exponential backoff for connection retries.
//!
//! Used by [`crate::Store::wait_for_connection`] to ping the store until the
//! first success. The delay grows by a constant multiplier up to a cap, with
//! ±20% jitter so a restarting fleet does not reconnect in lockstep.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Exponential backoff with jitter.
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at 500 ms, growing 1.5x per step, capped at
    /// 30 s.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 1.5,
            current: Duration::from_millis(500),
        }
    }

    /// Return the next delay and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current.as_secs_f64();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let jitter_factor = 0.8 + 0.4 * f64::from(nanos % 1000) / 1000.0;
        let delay = Duration::from_secs_f64((base * jitter_factor).min(self.max.as_secs_f64()));
        let next = base * self.multiplier;
        self.current = Duration::from_secs_f64(next.min(self.max.as_secs_f64()));
        delay
    }

    /// Reset the schedule to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_increases() {
        let mut b = ExponentialBackoff::new();
        let d1 = b.next_delay();
        let d2 = b.next_delay();
        let d3 = b.next_delay();
        assert!(d1.as_secs_f64() >= 0.3);
        assert!(d2.as_secs_f64() > d1.as_secs_f64() * 0.8);
        assert!(d3.as_secs_f64() <= 31.0);
    }

    #[test]
    fn backoff_reset() {
        let mut b = ExponentialBackoff::new();
        for _ in 0..20 {
            b.next_delay();
        }
        b.reset();
        let d = b.next_delay();
        assert!(d.as_secs_f64() < 1.0);
    }

    #[test]
    fn backoff_caps_at_max() {
        let mut b = ExponentialBackoff::new();
        for _ in 0..50 {
            b.next_delay();
        }
        let d = b.next_delay();
        // 30s cap plus 20% jitter headroom
        assert!(d.as_secs_f64() <= 36.0);
    }
}
