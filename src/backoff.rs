// MIT License - Copyright (c) Nick Whyte
// Rust translation

use std::time::Duration;

use crate::config::ClientConfig;

/// Exponential reconnect delay: `min * factor^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, factor: u32) -> Self {
        Self {
            min,
            max,
            factor: factor.max(1),
            attempt: 0,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_min_ms),
            Duration::from_millis(config.backoff_max_ms),
            config.backoff_factor,
        )
    }

    /// Delay for the current attempt. Advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .factor
            .checked_pow(self.attempt)
            .and_then(|mult| self.min.checked_mul(mult))
            .map_or(self.max, |d| d.min(self.max));
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth_and_cap() {
        let mut backoff =
            Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 2);
        let delays: Vec<u64> = (0..6)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_backoff_overflow_saturates_at_max() {
        let mut backoff =
            Backoff::new(Duration::from_millis(100), Duration::from_secs(10), 2);
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(10));
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::from_config(&ClientConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
