//! Retry observation
//!
//! The HTTP client picks [`TracingObserver`] in debug mode and
//! [`NoOpObserver`] otherwise, so retries stay silent unless diagnostics
//! were asked for.

use std::fmt::Display;
use std::time::Duration;

/// Callbacks fired while an operation is retried
pub trait RetryObserver: Send + Sync {
    /// Attempt `attempt` failed transiently; the next one starts after `delay`
    fn on_retry(&self, attempt: u32, error: &dyn Display, delay: Duration);

    fn on_success(&self, attempt: u32, elapsed: Duration);

    /// No further attempt will be made; `permanent` when the predicate said so
    fn on_give_up(&self, attempts: u32, error: &dyn Display, permanent: bool);
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_retry(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _elapsed: Duration) {}

    fn on_give_up(&self, _attempts: u32, _error: &dyn Display, _permanent: bool) {}
}

/// Observer that logs through `tracing`, tagged with an operation name
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_retry(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, elapsed: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                "succeeded after retry"
            );
        }
    }

    fn on_give_up(&self, attempts: u32, error: &dyn Display, permanent: bool) {
        if permanent {
            tracing::debug!(operation = %self.operation, error = %error, "not retrying");
        } else {
            tracing::error!(
                operation = %self.operation,
                attempts,
                error = %error,
                "all retry attempts exhausted"
            );
        }
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_retry(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        (**self).on_retry(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, elapsed: Duration) {
        (**self).on_success(attempt, elapsed)
    }

    fn on_give_up(&self, attempts: u32, error: &dyn Display, permanent: bool) {
        (**self).on_give_up(attempts, error, permanent)
    }
}
