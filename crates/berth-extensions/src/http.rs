//! Retrying HTTP client shared by asset downloads and the registry client

use berth_core::retry::{
    is_transient_status, HttpStatusError, NoOpObserver, RetryObserver, SimpleRetryExecutor,
    TracingObserver, TransientHttpPredicate,
};
use berth_core::types::RetryPolicy;
use std::fmt;
use std::time::Duration;

use crate::error::{ExtensionError, Result};

/// Why a request did not produce a usable response
#[derive(Debug)]
pub(crate) enum HttpFailure {
    Transport(reqwest::Error),
    /// Transient status that survived every retry
    Status { status: u16, body: String },
    NotAttempted,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpFailure::Transport(err) => write!(f, "{}", err),
            HttpFailure::Status { status, body } if body.is_empty() => write!(f, "HTTP {}", status),
            HttpFailure::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            HttpFailure::NotAttempted => f.write_str("retry policy allows no attempts"),
        }
    }
}

impl HttpStatusError for HttpFailure {
    fn status_code(&self) -> Option<u16> {
        match self {
            HttpFailure::Transport(err) => err.status().map(|s| s.as_u16()),
            HttpFailure::Status { status, .. } => Some(*status),
            HttpFailure::NotAttempted => Some(0),
        }
    }
}

/// `reqwest` client plus the retry policy applied to every request
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    debug: bool,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration, policy: RetryPolicy, debug: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ExtensionError::Http {
                operation: "client setup".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            policy,
            debug,
        })
    }

    /// Retry attempts are only logged in debug mode
    fn observer(&self, operation: &str) -> Box<dyn RetryObserver> {
        if self.debug {
            Box::new(TracingObserver::new(operation))
        } else {
            Box::new(NoOpObserver)
        }
    }

    /// Send the request built by `build`, retrying transport failures and
    /// transient statuses. Any other status is handed back as a response.
    pub async fn send<F>(
        &self,
        operation: &str,
        build: F,
    ) -> std::result::Result<reqwest::Response, HttpFailure>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let executor = SimpleRetryExecutor::new(self.policy.clone(), TransientHttpPredicate)
            .with_observer(self.observer(operation));

        let build = &build;
        let client = &self.client;
        executor
            .execute(move || async move {
                let response = build(client).send().await.map_err(HttpFailure::Transport)?;
                let status = response.status().as_u16();
                if is_transient_status(status) {
                    let body = response.text().await.unwrap_or_default();
                    return Err(HttpFailure::Status { status, body });
                }
                Ok(response)
            })
            .await
            .map_err(|err| err.into_source().unwrap_or(HttpFailure::NotAttempted))
    }
}
