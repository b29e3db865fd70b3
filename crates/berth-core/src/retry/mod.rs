//! Policy-driven async retry engine
//!
//! Used for registry calls and remote asset downloads. Delays and attempt
//! limits come from [`RetryPolicy`](crate::types::RetryPolicy), a
//! [`RetryPredicate`] separates transient failures from permanent ones, and
//! a [`RetryObserver`] reports what happened.
//!
//! ```rust,no_run
//! use berth_core::retry::{HttpStatusError, SimpleRetryExecutor, TransientHttpPredicate};
//! use berth_core::types::RetryPolicy;
//!
//! #[derive(Debug)]
//! struct Status(u16);
//!
//! impl std::fmt::Display for Status {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "HTTP {}", self.0)
//!     }
//! }
//!
//! impl HttpStatusError for Status {
//!     fn status_code(&self) -> Option<u16> {
//!         Some(self.0)
//!     }
//! }
//!
//! async fn example() -> Option<u16> {
//!     SimpleRetryExecutor::new(RetryPolicy::default(), TransientHttpPredicate)
//!         .execute(|| async { Err::<(), _>(Status(503)) })
//!         .await
//!         .err()
//!         .and_then(|err| err.into_source())
//!         .map(|status| status.0)
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::SimpleRetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{
    calculate_delay, is_transient_status, HttpStatusError, RetryPredicate, TransientHttpPredicate,
};
