//! Post-step wait conditions

use berth_cluster::ClusterOps;
use berth_core::types::{Selector, WaitCondition, WaitForSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ExtensionError, Result};

/// Blocks until declared readiness conditions hold
///
/// Each condition is a single bounded wait; a timeout is returned to the
/// caller with the cluster's last output and is not retried.
#[derive(Clone)]
pub struct WaitEngine {
    cluster: Arc<dyn ClusterOps>,
    default_timeout: Duration,
}

impl WaitEngine {
    pub fn new(cluster: Arc<dyn ClusterOps>, default_timeout: Duration) -> Self {
        Self {
            cluster,
            default_timeout,
        }
    }

    /// Wait for one condition, returning the cluster's output
    ///
    /// Pods selected by label must exist before their readiness is checked,
    /// otherwise a wait over zero objects would succeed trivially.
    pub async fn wait_for(&self, wait: &WaitCondition) -> Result<String> {
        match &wait.selector {
            Selector::Label(selector) if wait.needs_existence_check() => {
                debug!("Waiting for pods matching {} to exist", selector);
                self.cluster
                    .wait_pod_exists(wait.namespace.as_deref(), selector, wait.timeout)
                    .await
                    .map_err(|source| ExtensionError::WaitFailed {
                        what: format!("pods matching {}", selector),
                        source,
                    })?;
            }
            _ => {}
        }

        info!(
            "Waiting for {} {} to become {}",
            wait.kind, wait.selector, wait.condition
        );
        self.cluster
            .wait_for_condition(wait)
            .await
            .map_err(|source| ExtensionError::WaitFailed {
                what: format!("resource {} status to become {}", wait.kind, wait.condition),
                source,
            })
    }

    /// Evaluate `specs` strictly in order, stopping at the first failure
    pub async fn wait_all(&self, specs: &[WaitForSpec], namespace: Option<&str>) -> Result<usize> {
        for spec in specs {
            let condition = spec.resolve(namespace, self.default_timeout);
            self.wait_for(&condition).await?;
        }
        Ok(specs.len())
    }
}
