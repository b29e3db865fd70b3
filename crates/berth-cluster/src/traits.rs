//! Capability traits consumed by the extension orchestrator

use crate::error::Result;
use async_trait::async_trait;
use berth_core::types::{RoleRule, WaitCondition};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cluster-side operations
///
/// Implementations are expected to be idempotent where the cluster allows
/// it: creating an existing namespace and deleting a missing one succeed.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool>;

    /// Whether the namespace carries this system's ownership label
    async fn namespace_owned(&self, namespace: &str) -> Result<bool>;

    /// Mark the namespace as owned (idempotent)
    async fn label_namespace(&self, namespace: &str) -> Result<()>;

    async fn create_namespace(&self, namespace: &str) -> Result<()>;

    async fn delete_namespace(&self, namespace: &str) -> Result<()>;

    /// Decoded `data` of a secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, String>>;

    /// Block until at least one pod matches `selector`
    async fn wait_pod_exists(&self, namespace: Option<&str>, selector: &str, timeout: Duration)
        -> Result<()>;

    /// Block until the condition holds, returning the cluster's output
    async fn wait_for_condition(&self, wait: &WaitCondition) -> Result<String>;

    /// Whether ingress gateways can be created on this cluster
    async fn has_gateway_support(&self) -> Result<bool>;

    async fn create_gateway(&self, gateway: &GatewayRequest) -> Result<()>;

    /// Add `rule` to `role` in `namespace` unless an identical rule is present
    async fn grant_role_rule(&self, namespace: &str, role: &str, rule: &RoleRule) -> Result<()>;
}

/// Installation tooling: manifests, overlays, helm and scripts
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn apply_manifest(&self, manifest: &Path, namespace: Option<&str>) -> Result<String>;

    /// Delete manifest resources, ignoring ones that are already gone
    async fn delete_manifest(&self, manifest: &Path, namespace: Option<&str>) -> Result<String>;

    /// Apply an overlay directory (local path or remote reference)
    async fn apply_kustomize(&self, location: &str, namespace: Option<&str>) -> Result<String>;

    async fn delete_kustomize(&self, location: &str, namespace: Option<&str>) -> Result<String>;

    /// Names of deployed helm releases
    async fn helm_deployed_releases(&self, namespace: Option<&str>) -> Result<Vec<String>>;

    async fn helm_install(&self, release: &HelmRelease) -> Result<String>;

    /// Remove a release; `Ok(false)` when it did not exist
    async fn helm_uninstall(&self, name: &str, namespace: Option<&str>) -> Result<bool>;

    /// Run an executable script with `workdir` as its working directory
    async fn run_script(&self, script: &Path, workdir: &Path) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelmAction {
    Install,
    Upgrade,
}

impl HelmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelmAction::Install => "install",
            HelmAction::Upgrade => "upgrade",
        }
    }
}

/// Chart reference after asset resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelmChart {
    Archive(PathBuf),
    Repository { repo: String, chart: String },
}

/// A fully resolved helm install or upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmRelease {
    pub action: HelmAction,
    pub name: String,
    pub chart: HelmChart,
    pub values: Option<PathBuf>,
    pub version: Option<String>,
    pub namespace: Option<String>,
}

impl HelmRelease {
    /// Arguments passed to `helm`
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.action.as_str().to_string(), self.name.clone()];
        match &self.chart {
            HelmChart::Archive(path) => args.push(path.display().to_string()),
            HelmChart::Repository { repo, chart } => {
                args.extend([chart.clone(), "--repo".to_string(), repo.clone()])
            }
        }
        args.push("--create-namespace".to_string());
        if let Some(values) = &self.values {
            args.extend(["--values".to_string(), values.display().to_string()]);
        }
        args.push("--wait".to_string());
        if let Some(namespace) = &self.namespace {
            args.extend(["--namespace".to_string(), namespace.clone()]);
        }
        if let Some(version) = &self.version {
            args.extend(["--version".to_string(), version.clone()]);
        }
        args
    }
}

/// Ingress gateway to create for an installed extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub name: String,
    pub namespace: String,
    pub host: String,
    /// Service to route to; without it only the gateway is created
    pub service_host: Option<String>,
    pub port: u16,
}
