use std::time::Duration;

use lor_config::SubmissionConfig;

/// Bounded exponential backoff plus the confirmation windows of one
/// submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
    /// Interval between signature status polls.
    pub confirm_poll: Duration,
    /// How long a signed transaction is polled before the node is asked
    /// whether its blockhash has expired. It is rebuilt only once it has.
    pub attempt_confirm_timeout: Duration,
    /// Budget for the whole request, across all attempts.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SubmissionConfig::default())
    }
}

impl From<&SubmissionConfig> for RetryPolicy {
    fn from(cfg: &SubmissionConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            multiplier: cfg.multiplier.max(1),
            confirm_poll: Duration::from_millis(cfg.confirm_poll_ms),
            attempt_confirm_timeout: Duration::from_millis(cfg.attempt_confirm_timeout_ms),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based):
    /// `initial * multiplier^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exp).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}
