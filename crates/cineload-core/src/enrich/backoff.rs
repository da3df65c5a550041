use std::time::Duration;

const DEFAULT_BASE: Duration = Duration::from_millis(500);
const DEFAULT_CEILING: Duration = Duration::from_secs(5);

/// Retry state machine for transient transport failures: the delay
/// before each retry doubles from `base`, capped at `ceiling`, until
/// `max_attempts` attempts have failed.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self::with_schedule(DEFAULT_BASE, DEFAULT_CEILING, max_attempts)
    }

    #[must_use]
    pub fn with_schedule(base: Duration, ceiling: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            ceiling,
            max_attempts: max_attempts.max(1),
            attempt: 0,
        }
    }

    /// Record a failed attempt. Returns the delay to wait before the
    /// next attempt, or `None` once all attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let exponent = self.attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        Some(self.base.saturating_mul(factor).min(self.ceiling))
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
