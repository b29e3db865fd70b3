//! Error returned by the retry engine

use std::error::Error;
use std::fmt;

/// Failure of a retried operation, generic over the operation's error `E`
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a transient error
    Exhausted { attempts: u32, source: E },

    /// The predicate judged the error permanent
    Permanent(E),

    /// The policy allows no attempt at all
    NoAttempts,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, source } => {
                write!(f, "gave up after {} attempts: {}", attempts, source)
            }
            RetryError::Permanent(source) => write!(f, "{}", source),
            RetryError::NoAttempts => f.write_str("retry policy allows no attempts"),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Permanent(source) => Some(source),
            RetryError::NoAttempts => None,
        }
    }
}

impl<E> RetryError<E> {
    /// The last underlying error, if any attempt was made
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Permanent(source) => Some(source),
            RetryError::NoAttempts => None,
        }
    }
}
