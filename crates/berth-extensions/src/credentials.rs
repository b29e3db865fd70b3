//! Credential transform pipeline
//!
//! Turns the `servicecredentials` rules of a descriptor into concrete
//! values read from cluster secrets.

use berth_cluster::ClusterOps;
use berth_core::types::{ExtensionDescriptor, TransformedCredentials};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ExtensionError, Result};

pub struct CredentialTransformer {
    cluster: Arc<dyn ClusterOps>,
}

impl CredentialTransformer {
    pub fn new(cluster: Arc<dyn ClusterOps>) -> Self {
        Self { cluster }
    }

    /// Resolve every transform rule of `descriptor`
    ///
    /// Any unreadable secret or missing field aborts the whole resolution;
    /// partial credential sets are never returned. Each distinct secret is
    /// fetched once.
    pub async fn resolve(&self, descriptor: &ExtensionDescriptor) -> Result<TransformedCredentials> {
        let mut secrets: BTreeMap<(String, String), BTreeMap<String, String>> = BTreeMap::new();
        let mut resolved = TransformedCredentials::new();

        // services and credentials without rules still get an (empty) entry
        for service in &descriptor.service_credentials {
            let credentials = resolved.entry(service.service_id.clone()).or_default();
            for credential in &service.credentials {
                credentials.entry(credential.id.clone()).or_default();
            }
        }

        for rule in descriptor.transform_rules() {
            let key = (rule.secret_namespace.to_string(), rule.secret_name.to_string());
            if !secrets.contains_key(&key) {
                debug!("Reading secret {}/{}", rule.secret_namespace, rule.secret_name);
                let data = self
                    .cluster
                    .get_secret(rule.secret_namespace, rule.secret_name)
                    .await
                    .map_err(|e| ExtensionError::Credentials {
                        message: format!(
                            "secret {}/{} for {}/{}: {}",
                            rule.secret_namespace,
                            rule.secret_name,
                            rule.service_id,
                            rule.credential_id,
                            e
                        ),
                    })?;
                secrets.insert(key.clone(), data);
            }

            let value = secrets
                .get(&key)
                .and_then(|data| data.get(rule.secret_field))
                .ok_or_else(|| ExtensionError::Credentials {
                    message: format!(
                        "secret {}/{} has no field {}",
                        rule.secret_namespace, rule.secret_name, rule.secret_field
                    ),
                })?;

            resolved
                .entry(rule.service_id.to_string())
                .or_default()
                .entry(rule.credential_id.to_string())
                .or_default()
                .insert(rule.config_key.to_string(), value.clone());
        }

        Ok(resolved)
    }
}
