//! Retry execution

use std::fmt;
use std::future::Future;
use std::time::Instant;

use crate::types::{RetryPolicy, RetryStrategy};

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, RetryPredicate};

/// Runs an async operation until it succeeds, fails permanently, or the
/// policy runs out of attempts
///
/// [`RetryStrategy::None`] allows exactly one attempt whatever
/// `max_attempts` says.
pub struct SimpleRetryExecutor<P, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
}

impl<P> SimpleRetryExecutor<P> {
    pub fn new(policy: RetryPolicy, predicate: P) -> Self {
        Self {
            policy,
            predicate,
            observer: NoOpObserver,
            jitter: true,
        }
    }
}

impl<P, O> SimpleRetryExecutor<P, O> {
    pub fn with_observer<O2: RetryObserver>(self, observer: O2) -> SimpleRetryExecutor<P, O2> {
        SimpleRetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
        }
    }

    /// Enable or disable the random 0-25% delay increase
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn max_attempts(&self) -> u32 {
        match self.policy.strategy {
            RetryStrategy::None => self.policy.max_attempts.min(1),
            _ => self.policy.max_attempts,
        }
    }

    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: RetryPredicate<E>,
        O: RetryObserver,
    {
        let start = Instant::now();
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        while attempt < max_attempts {
            attempt += 1;
            let err = match op().await {
                Ok(value) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_give_up(attempt, &err, true);
                return Err(RetryError::Permanent(err));
            }
            if attempt == max_attempts {
                self.observer.on_give_up(attempt, &err, false);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = calculate_delay(&self.policy, attempt, self.jitter);
            self.observer.on_retry(attempt, &err, delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(RetryError::NoAttempts)
    }
}
