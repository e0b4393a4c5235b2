//! Retry policy for generation units: exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Tunable parameters for per-unit retry behaviour.
///
/// A unit issues at most `max_retries + 1` provider calls; only after
/// exhaustion is it recorded as failed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Factor by which the delay grows after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on the delay between attempts.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Total provider calls a unit may issue.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff delay after `failed_attempts` attempts have failed
    /// (1-based: the delay before retry N follows N failed attempts).
    ///
    /// The result is clamped to [`RetryPolicy::max_backoff`].
    pub fn backoff_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let ms = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        Duration::from_millis(ms as u64).min(self.max_backoff)
    }
}

/// Apply jitter to a backoff delay: a uniform value in 50-100% of the
/// nominal delay, so synchronized retries against the provider spread
/// out.
pub fn jittered(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor: f64 = rand::rng().random_range(0.5..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
