//! Exponential backoff retry policy with jitter.
//!
//! Transient delivery failures are rescheduled, never retried in a blocking
//! loop. The delay doubles per retry up to a ceiling, and jitter spreads
//! simultaneous failures out so a recovering endpoint is not hit by a
//! synchronized storm.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for webhook delivery.
///
/// Values are configuration, not invariants; every deployment can tune them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum delivery attempts, including the initial one.
    pub max_attempts: u32,

    /// Base delay for the exponential backoff calculation.
    pub base_delay: Duration,

    /// Ceiling on the delay between attempts.
    pub max_delay: Duration,

    /// Whether to randomize delays to avoid synchronized retries.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
            jitter: true,
        }
    }
}

/// Result of a retry decision after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry at the given time.
    Retry {
        /// When the next attempt is due.
        next_attempt_at: DateTime<Utc>,
    },
    /// Stop retrying; the record becomes terminally failed.
    GiveUp {
        /// Why no further attempts will be made.
        reason: String,
    },
}

impl RetryPolicy {
    /// Delay before the retry with the given zero-based retry count.
    ///
    /// `delay = min(base_delay * 2^retry_count, max_delay)`, multiplied by a
    /// random factor in `[0.5, 1.0]` when jitter is enabled. The exponent is
    /// clamped so large retry counts saturate at the ceiling instead of
    /// overflowing.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry_count.min(20));
        let raw = self.base_delay.saturating_mul(multiplier);
        let capped = raw.min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let factor = 0.5 + rand::rng().random_range(0.0..=0.5);
        Duration::from_secs_f64(capped.as_secs_f64() * factor)
    }

    /// Decides whether to retry after `attempts_made` failed attempts.
    ///
    /// `attempts_made` counts the attempt that just failed; the first failure
    /// therefore backs off by `backoff_delay(0)`.
    pub fn decide(&self, attempts_made: u32, now: DateTime<Utc>) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.backoff_delay(attempts_made.saturating_sub(1));
        let Ok(chrono_delay) = chrono::Duration::from_std(delay) else {
            return RetryDecision::GiveUp { reason: "retry delay out of range".to_string() };
        };

        RetryDecision::Retry { next_attempt_at: now + chrono_delay }
    }
}
