//! Reconnection Policy
//!
//! Bounded, fixed-delay retry schedule for restoring a lost connection.
//! The stream protocol favors a short fixed delay over exponential growth:
//! the server is either back within a few attempts or the session is
//! declared offline and left for the caller to reinitiate.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::WebSocketSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between attempts.
    pub delay: Duration,
    /// Jitter factor as a fraction (e.g. 0.1 = ±10% randomization).
    /// Zero disables jitter.
    pub jitter_factor: f64,
    /// Maximum number of attempts before the session gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            jitter_factor: 0.0,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Create a configuration with custom values.
    #[must_use]
    pub const fn new(delay: Duration, jitter_factor: f64, max_attempts: u32) -> Self {
        Self {
            delay,
            jitter_factor,
            max_attempts,
        }
    }

    /// Create a configuration from [`WebSocketSettings`].
    #[must_use]
    pub const fn from_settings(settings: &WebSocketSettings) -> Self {
        Self {
            delay: settings.reconnect_delay,
            jitter_factor: settings.reconnect_jitter,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Bounded retry schedule for one outage.
///
/// # Example
///
/// ```rust
/// use openalgo_stream_client::infrastructure::openalgo::reconnect::{
///     ReconnectConfig, ReconnectPolicy,
/// };
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// // Five delays, then exhaustion.
/// for _ in 0..5 {
///     assert!(policy.next_delay().is_some());
/// }
/// assert!(policy.next_delay().is_none());
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a fresh policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, or `None` when attempts are
    /// exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt_count >= self.config.max_attempts {
            return None;
        }

        self.attempt_count += 1;
        Some(self.apply_jitter(self.config.delay))
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Attempts consumed so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(adjusted_millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_five_by_five() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 5);
        assert!(config.jitter_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn exactly_max_attempts_are_allowed() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());

        for attempt in 1..=5 {
            assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
            assert_eq!(policy.attempt_count(), attempt);
        }

        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
    }

    #[test]
    fn reset_restores_full_budget() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());

        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig::new(
                Duration::from_millis(1_000),
                0.1,
                5,
            ));

            let delay = policy.next_delay().unwrap();
            let millis = delay.as_millis();
            assert!(millis >= 900, "delay {millis}ms below minimum");
            assert!(millis <= 1_100, "delay {millis}ms above maximum");
        }
    }

    #[test]
    fn zero_attempts_never_retries() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::new(Duration::from_secs(5), 0.0, 0));
        assert!(!policy.should_retry());
        assert!(policy.next_delay().is_none());
    }
}
