use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pause between a conflicting attempt and the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Same pause every time.
    Fixed(Duration),
    /// `initial`, doubled after every conflict, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

/// How often the transaction runner retries a unit of work that lost a deadlock or
/// serialization conflict.
///
/// The default retries without limit and without pausing. Other failures are never
/// retried, whatever the policy says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. `None` means no limit.
    pub max_attempts: Option<NonZeroU32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up after `max_attempts` attempts in total.
    #[must_use]
    pub fn bounded(max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Backoff::None,
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether another attempt may follow `attempts` failed ones.
    #[must_use]
    pub fn allows_retry_after(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max.get())
    }

    /// Pause before the attempt that follows attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        match self.backoff {
            Backoff::None => None,
            Backoff::Fixed(delay) => Some(delay),
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }
}
