use crate::entropy::Entropy;
use std::time::Duration;

/// Every account operation and login gets this many attempts in total.
pub const MAX_ATTEMPTS: u32 = 3;

/// Linear backoff with additive jitter:
/// `(attempt + step_offset) * step_ms + random(0, jitter_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub step_ms: u64,
    pub step_offset: u32,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::request()
    }
}

impl RetryConfig {
    /// Login backoff: `(attempt + 1) * 2000ms + random(0, 3000ms)`.
    pub const fn session() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            step_ms: 2000,
            step_offset: 1,
            jitter_ms: 3000,
        }
    }

    /// Operation backoff: `attempt * 3000ms + random(0, 5000ms)`.
    pub const fn request() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            step_ms: 3000,
            step_offset: 0,
            jitter_ms: 5000,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_ms = 0;
        self
    }

    /// Whether a failed `attempt` (0-based) may be followed by another one.
    pub fn has_retry_left(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    pub fn base_delay(&self, attempt: u32) -> Duration {
        let steps = u64::from(attempt + self.step_offset);
        Duration::from_millis(steps * self.step_ms)
    }

    /// Delay to wait after the failed `attempt` before the next one.
    pub fn calculate_delay(&self, attempt: u32, entropy: &mut dyn Entropy) -> Duration {
        self.base_delay(attempt) + Duration::from_millis(entropy.below(self.jitter_ms))
    }
}

/// Per-attempt timeout that grows linearly: `base * (attempt + 1)`.
pub fn attempt_timeout(base: Duration, attempt: u32) -> Duration {
    base * (attempt + 1)
}
