//! Error types for extension operations

use berth_cluster::ClusterError;
use berth_core::types::StepError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtensionError>;

#[derive(Error, Debug)]
pub enum ExtensionError {
    /// A remote asset could not be downloaded or a local one is missing
    #[error("Failed fetching {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to read description file {}: {source}", .path.display())]
    DescriptorRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse description file {location}: {source}")]
    DescriptorParse {
        location: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Required step fields are missing
    #[error("Invalid {step} step: {source}")]
    InvalidStep {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Unsupported step type: {0}")]
    UnsupportedStepType(String),

    /// A step handler failed; `step` names the step and its target
    #[error("Failed to {action} {step}: {source}")]
    StepFailed {
        action: &'static str,
        step: String,
        #[source]
        source: Box<ExtensionError>,
    },

    #[error("Failed while waiting for {what}: {source}")]
    WaitFailed {
        what: String,
        #[source]
        source: ClusterError,
    },

    #[error("Failed to transform values for credentials: {message}")]
    Credentials { message: String },

    /// Non-success registry response; `body` is the server's reply verbatim
    #[error("Registry returned {status} for {operation}: {body}")]
    Registry {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("HTTP request for {operation} failed: {message}")]
    Http { operation: String, message: String },

    #[error("{0} not provided")]
    MissingSetting(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ExtensionError {
    pub fn fetch(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Attach step context to a handler failure
    pub fn step_failed(action: &'static str, step: impl Into<String>, source: ExtensionError) -> Self {
        Self::StepFailed {
            action,
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Turn a step validation error into the matching variant
    pub fn from_step(step: impl Into<String>, source: StepError) -> Self {
        match source {
            StepError::UnsupportedType(kind) => Self::UnsupportedStepType(kind),
            source => Self::InvalidStep {
                step: step.into(),
                source,
            },
        }
    }
}
