//! Retry policy — linear backoff with a bounded attempt budget.
//!
//! External calls (AI generation, scraping, social posting) fail transiently
//! on rate limits and timeouts; a bounded retry count with growing delay
//! handles those without per-error classification, while permanently broken
//! tasks stop burning provider quota quickly.

use chrono::Duration;

/// What to do with a task whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue: bump `retry_count` to the given value and delay by `delay`.
    Retry { retry_count: u32, delay: Duration },
    /// Retry budget exhausted — mark Failed.
    GiveUp,
}

/// Linear-in-retry-count backoff: attempt n waits `n * base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay_secs: u64,
}

impl RetryPolicy {
    pub fn new(base_delay_secs: u64) -> Self {
        Self { base_delay_secs }
    }

    /// Decide the fate of a task after a failed attempt.
    ///
    /// `retry_count` is the count *before* this failure is recorded, so the
    /// invariant `retry_count <= max_retries` always holds afterwards.
    pub fn next_attempt(&self, retry_count: u32, max_retries: u32) -> RetryDecision {
        if retry_count < max_retries {
            let next = retry_count + 1;
            RetryDecision::Retry {
                retry_count: next,
                delay: Duration::seconds((next as i64) * (self.base_delay_secs as i64)),
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(60)
    }
}
