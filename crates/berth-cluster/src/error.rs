//! Error types for cluster operations

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// A subprocess exited unsuccessfully
    #[error("{command} failed:\n{output}")]
    CommandFailed { command: String, output: String },

    /// A bounded wait elapsed; `output` is the last thing the cluster said
    #[error("timed out after {}s waiting for {what}:\n{output}", .timeout.as_secs())]
    Timeout {
        what: String,
        timeout: Duration,
        output: String,
    },

    /// The program could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Output that could not be interpreted
    #[error("unexpected output from {what}: {message}")]
    Decode { what: String, message: String },
}

impl ClusterError {
    pub fn decode(what: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Combined output of a failed command or an expired wait
    pub fn output(&self) -> Option<&str> {
        match self {
            ClusterError::CommandFailed { output, .. } | ClusterError::Timeout { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}
