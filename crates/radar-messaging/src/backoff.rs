//! Exponential backoff for realtime resubscription

use std::time::Duration;

use crate::config::BackoffConfig;

/// Exponential backoff state
///
/// Each call to [`advance`](Self::advance) returns the current delay and
/// multiplies the stored one by `factor`, clamped to `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    next: Duration,
    attempts: u32,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `config.initial`
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            next: config.initial.min(config.max),
            config,
            attempts: 0,
        }
    }

    /// Return the delay to wait now and precompute the next one
    pub fn advance(&mut self) -> Duration {
        let current = self.next;
        self.next = current
            .saturating_mul(self.config.factor.max(1))
            .min(self.config.max);
        self.attempts = self.attempts.saturating_add(1);
        current
    }

    /// Peek at the next delay without advancing
    pub fn peek(&self) -> Duration {
        self.next
    }

    /// Consecutive failures since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over from the initial delay
    pub fn reset(&mut self) {
        self.next = self.config.initial.min(self.config.max);
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            factor: 2,
        }
    }

    #[test]
    fn test_doubles_until_clamped() {
        let mut backoff = ExponentialBackoff::new(config());
        let delays: Vec<u64> = (0..6).map(|_| backoff.advance().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_reset() {
        let mut backoff = ExponentialBackoff::new(config());
        backoff.advance();
        backoff.advance();
        assert_eq!(backoff.peek(), Duration::from_secs(4));

        backoff.reset();
        assert_eq!(backoff.peek(), Duration::from_secs(1));
        assert_eq!(backoff.attempts(), 0);
    }

    #[test]
    fn test_zero_factor_does_not_collapse_delay() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig {
            factor: 0,
            ..config()
        });
        backoff.advance();
        assert_eq!(backoff.peek(), Duration::from_secs(1));
    }
}
