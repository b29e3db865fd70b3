//! Manager configuration
//!
//! Everything the orchestrator would otherwise read from fixed constants
//! (shared namespaces, asset names, label keys, timeouts) lives here and is
//! passed explicitly into each component.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the extension manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManagerConfig {
    /// Shared namespace workloads run in; never deleted by uninstall
    #[serde(default = "default_workloads_namespace")]
    pub workloads_namespace: String,

    /// Role in the workloads namespace that receives extension RBAC rules
    #[serde(default = "default_workloads_role")]
    pub workloads_role: String,

    /// Well-known descriptor file name under `<repository>/<extension>/`
    #[serde(default = "default_description_file")]
    pub description_file: String,

    /// Prefix for scoped scratch directories
    #[serde(default = "default_scratch_prefix")]
    pub scratch_prefix: String,

    /// Label marking namespaces managed by this system
    #[serde(default)]
    pub ownership_label: OwnershipLabel,

    /// Wait timeout used when a wait entry declares none
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Cluster ingress domain, used for gateway hosts and the registry URL
    #[serde(default)]
    pub system_domain: Option<String>,

    /// Registry endpoint settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry policy for registry calls and remote downloads
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Surface retry attempts and command output in logs
    #[serde(default)]
    pub debug: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workloads_namespace: default_workloads_namespace(),
            workloads_role: default_workloads_role(),
            description_file: default_description_file(),
            scratch_prefix: default_scratch_prefix(),
            ownership_label: OwnershipLabel::default(),
            default_timeout_secs: default_timeout_secs(),
            system_domain: None,
            registry: RegistryConfig::default(),
            network: NetworkConfig::default(),
            retry: RetryPolicy::default(),
            debug: false,
        }
    }
}

impl ManagerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Registry base URL: the explicit one, else derived from the system domain
    pub fn registry_url(&self) -> Option<String> {
        if let Some(url) = self.registry.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.trim_end_matches('/').to_string());
        }
        self.system_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|domain| format!("http://{}.{}", self.registry.core_service, domain))
    }
}

fn default_workloads_namespace() -> String {
    "berth-workloads".to_string()
}
fn default_workloads_role() -> String {
    "berth-workloads".to_string()
}
fn default_description_file() -> String {
    "description.yaml".to_string()
}
fn default_scratch_prefix() -> String {
    "berth-extension".to_string()
}
fn default_timeout_secs() -> u64 {
    300 // 5 minutes
}

/// Label key/value put on namespaces this system owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OwnershipLabel {
    #[serde(default = "default_label_key")]
    pub key: String,
    #[serde(default = "default_label_value")]
    pub value: String,
}

impl Default for OwnershipLabel {
    fn default() -> Self {
        Self {
            key: default_label_key(),
            value: default_label_value(),
        }
    }
}

impl OwnershipLabel {
    /// `key=value` form accepted by kubectl
    pub fn selector(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

fn default_label_key() -> String {
    "berth.dev/deployment".to_string()
}
fn default_label_value() -> String {
    "berth".to_string()
}

/// Registry endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Explicit registry base URL
    #[serde(default)]
    pub url: Option<String>,

    /// Host name of the core service under the system domain
    #[serde(default = "default_core_service")]
    pub core_service: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            core_service: default_core_service(),
        }
    }
}

fn default_core_service() -> String {
    "berth-core".to_string()
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Per-request timeout for registry calls in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for asset downloads in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    300 // 5 minutes
}
fn default_user_agent() -> String {
    format!(
        "berth/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Retry policy for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// No retry
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.workloads_namespace, "berth-workloads");
        assert_eq!(config.description_file, "description.yaml");
        assert_eq!(config.default_timeout(), Duration::from_secs(300));
        assert_eq!(config.ownership_label.selector(), "berth.dev/deployment=berth");
        assert_eq!(config.retry.strategy, RetryStrategy::ExponentialBackoff);
    }

    #[test]
    fn test_registry_url_from_domain() {
        let config = ManagerConfig {
            system_domain: Some("10.0.0.5.nip.io".into()),
            ..Default::default()
        };
        assert_eq!(
            config.registry_url().as_deref(),
            Some("http://berth-core.10.0.0.5.nip.io")
        );
    }

    #[test]
    fn test_explicit_registry_url_wins() {
        let mut config = ManagerConfig {
            system_domain: Some("example.com".into()),
            ..Default::default()
        };
        config.registry.url = Some("http://localhost:8080/".into());
        assert_eq!(config.registry_url().as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_no_registry_url_without_domain() {
        assert_eq!(ManagerConfig::default().registry_url(), None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
workloads-namespace: shared
retry:
  strategy: fixed-delay
  max-attempts: 2
"#;
        let config: ManagerConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.workloads_namespace, "shared");
        assert_eq!(config.workloads_role, "berth-workloads");
        assert_eq!(config.retry.strategy, RetryStrategy::FixedDelay);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }
}
