//! Retry delays and retry predicates

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Delay before the attempt following `attempt` (1-indexed)
///
/// ```rust
/// use berth_core::retry::calculate_delay;
/// use berth_core::types::{RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 1000,
///     max_delay_ms: 30000,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }
        RetryStrategy::LinearBackoff => policy
            .initial_delay_ms
            .saturating_mul(attempt_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    // up to 25% extra
    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::rng().random_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether an error is worth another attempt
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Errors that may carry an HTTP status
pub trait HttpStatusError {
    /// `None` for transport-level failures (connect, reset, timeout)
    fn status_code(&self) -> Option<u16>;
}

/// Status codes treated as transient: 408, 429 and 5xx except 501
pub fn is_transient_status(code: u16) -> bool {
    matches!(code, 408 | 429) || ((500..600).contains(&code) && code != 501)
}

/// Retries transport failures and transient HTTP statuses
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientHttpPredicate;

impl<E: HttpStatusError> RetryPredicate<E> for TransientHttpPredicate {
    fn should_retry(&self, error: &E) -> bool {
        error.status_code().map(is_transient_status).unwrap_or(true)
    }
}
