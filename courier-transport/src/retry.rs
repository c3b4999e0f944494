//! Exponential backoff policy shared by clipboard writes and injection
//! retries.

/// Retry configuration for exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// A policy that tries exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given attempt (0-indexed): `initial * multiplier^attempt`,
    /// capped at `max_delay_ms`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        base_delay.clamp(0.0, self.max_delay_ms as f64) as u64
    }
}
