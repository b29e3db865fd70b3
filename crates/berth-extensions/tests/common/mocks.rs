//! Recording mocks of `ClusterOps` and `ToolRunner`
//!
//! Both keep their state behind `Mutex`es and record every call so tests can
//! assert on what reached the cluster and in which order.

#![allow(dead_code)]

use async_trait::async_trait;
use berth_cluster::{ClusterError, ClusterOps, GatewayRequest, HelmRelease, Result, ToolRunner};
use berth_core::types::{RoleRule, Selector, WaitCondition};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    NamespaceExists(String),
    NamespaceOwned(String),
    LabelNamespace(String),
    CreateNamespace(String),
    DeleteNamespace(String),
    GetSecret(String, String),
    WaitPodExists {
        namespace: Option<String>,
        selector: String,
        timeout: Duration,
    },
    WaitForCondition(WaitCondition),
    HasGatewaySupport,
    CreateGateway(GatewayRequest),
    GrantRoleRule {
        namespace: String,
        role: String,
        rule: RoleRule,
    },
}

impl ClusterCall {
    /// Whether the call changes cluster state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ClusterCall::LabelNamespace(_)
                | ClusterCall::CreateNamespace(_)
                | ClusterCall::DeleteNamespace(_)
                | ClusterCall::CreateGateway(_)
                | ClusterCall::GrantRoleRule { .. }
        )
    }
}

/// In-memory cluster: namespaces with an ownership flag, secrets, waits
#[derive(Default)]
pub struct MockCluster {
    /// namespace -> carries the ownership label
    namespaces: Mutex<BTreeMap<String, bool>>,
    secrets: BTreeMap<(String, String), BTreeMap<String, String>>,
    gateway_support: bool,
    /// selectors whose waits time out
    stuck_selectors: BTreeSet<String>,
    calls: Mutex<Vec<ClusterCall>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owned_namespace(self, namespace: &str) -> Self {
        self.insert_namespace(namespace, true);
        self
    }

    pub fn with_foreign_namespace(self, namespace: &str) -> Self {
        self.insert_namespace(namespace, false);
        self
    }

    pub fn with_secret(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        self.secrets.insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn with_gateway_support(mut self) -> Self {
        self.gateway_support = true;
        self
    }

    pub fn with_stuck_selector(mut self, selector: &str) -> Self {
        self.stuck_selectors.insert(selector.to_string());
        self
    }

    fn insert_namespace(&self, namespace: &str, owned: bool) {
        self.namespaces
            .lock()
            .unwrap()
            .insert(namespace.to_string(), owned);
    }

    fn record(&self, call: ClusterCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<ClusterCall> {
        self.calls().into_iter().filter(ClusterCall::is_mutation).collect()
    }

    pub fn waits(&self) -> Vec<ClusterCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    ClusterCall::WaitPodExists { .. } | ClusterCall::WaitForCondition(_)
                )
            })
            .collect()
    }

    /// `Some(owned)` for existing namespaces
    pub fn namespace(&self, namespace: &str) -> Option<bool> {
        self.namespaces.lock().unwrap().get(namespace).copied()
    }
}

#[async_trait]
impl ClusterOps for MockCluster {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        self.record(ClusterCall::NamespaceExists(namespace.to_string()));
        Ok(self.namespace(namespace).is_some())
    }

    async fn namespace_owned(&self, namespace: &str) -> Result<bool> {
        self.record(ClusterCall::NamespaceOwned(namespace.to_string()));
        Ok(self.namespace(namespace).unwrap_or(false))
    }

    async fn label_namespace(&self, namespace: &str) -> Result<()> {
        self.record(ClusterCall::LabelNamespace(namespace.to_string()));
        self.insert_namespace(namespace, true);
        Ok(())
    }

    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.record(ClusterCall::CreateNamespace(namespace.to_string()));
        self.namespaces
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_insert(false);
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.record(ClusterCall::DeleteNamespace(namespace.to_string()));
        self.namespaces.lock().unwrap().remove(namespace);
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, String>> {
        self.record(ClusterCall::GetSecret(namespace.to_string(), name.to_string()));
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::CommandFailed {
                command: format!("kubectl get secret {} -n {}", name, namespace),
                output: format!("secrets \"{}\" not found", name),
            })
    }

    async fn wait_pod_exists(
        &self,
        namespace: Option<&str>,
        selector: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.record(ClusterCall::WaitPodExists {
            namespace: namespace.map(str::to_string),
            selector: selector.to_string(),
            timeout,
        });
        Ok(())
    }

    async fn wait_for_condition(&self, wait: &WaitCondition) -> Result<String> {
        self.record(ClusterCall::WaitForCondition(wait.clone()));
        if let Selector::Label(selector) = &wait.selector {
            if self.stuck_selectors.contains(selector) {
                return Err(ClusterError::Timeout {
                    what: format!("{} condition {}", wait.kind, wait.condition),
                    timeout: wait.timeout,
                    output: format!("error: timed out waiting for the condition on {}", selector),
                });
            }
        }
        Ok(format!("{} condition met", wait.kind))
    }

    async fn has_gateway_support(&self) -> Result<bool> {
        self.record(ClusterCall::HasGatewaySupport);
        Ok(self.gateway_support)
    }

    async fn create_gateway(&self, gateway: &GatewayRequest) -> Result<()> {
        self.record(ClusterCall::CreateGateway(gateway.clone()));
        Ok(())
    }

    async fn grant_role_rule(&self, namespace: &str, role: &str, rule: &RoleRule) -> Result<()> {
        self.record(ClusterCall::GrantRoleRule {
            namespace: namespace.to_string(),
            role: role.to_string(),
            rule: rule.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ApplyManifest {
        path: PathBuf,
        namespace: Option<String>,
        /// File content at the time of the call
        content: Option<String>,
    },
    DeleteManifest {
        path: PathBuf,
        namespace: Option<String>,
    },
    ApplyKustomize {
        location: String,
        namespace: Option<String>,
    },
    DeleteKustomize {
        location: String,
        namespace: Option<String>,
    },
    HelmList(Option<String>),
    HelmInstall(HelmRelease),
    HelmUninstall {
        name: String,
        namespace: Option<String>,
    },
    RunScript {
        script: PathBuf,
        workdir: PathBuf,
        executable: bool,
    },
}

impl ToolCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ToolCall::HelmList(_))
    }
}

/// Tooling mock tracking deployed helm releases
#[derive(Default)]
pub struct MockTools {
    releases: Mutex<Vec<String>>,
    calls: Mutex<Vec<ToolCall>>,
}

impl MockTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(self, name: &str) -> Self {
        self.releases.lock().unwrap().push(name.to_string());
        self
    }

    fn record(&self, call: ToolCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<ToolCall> {
        self.calls().into_iter().filter(ToolCall::is_mutation).collect()
    }

    pub fn helm_installs(&self) -> Vec<HelmRelease> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ToolCall::HelmInstall(release) => Some(release),
                _ => None,
            })
            .collect()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o100 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.exists()
}

#[async_trait]
impl ToolRunner for MockTools {
    async fn apply_manifest(&self, manifest: &Path, namespace: Option<&str>) -> Result<String> {
        self.record(ToolCall::ApplyManifest {
            path: manifest.to_path_buf(),
            namespace: namespace.map(str::to_string),
            content: std::fs::read_to_string(manifest).ok(),
        });
        Ok(String::new())
    }

    async fn delete_manifest(&self, manifest: &Path, namespace: Option<&str>) -> Result<String> {
        self.record(ToolCall::DeleteManifest {
            path: manifest.to_path_buf(),
            namespace: namespace.map(str::to_string),
        });
        Ok(String::new())
    }

    async fn apply_kustomize(&self, location: &str, namespace: Option<&str>) -> Result<String> {
        self.record(ToolCall::ApplyKustomize {
            location: location.to_string(),
            namespace: namespace.map(str::to_string),
        });
        Ok(String::new())
    }

    async fn delete_kustomize(&self, location: &str, namespace: Option<&str>) -> Result<String> {
        self.record(ToolCall::DeleteKustomize {
            location: location.to_string(),
            namespace: namespace.map(str::to_string),
        });
        Ok(String::new())
    }

    async fn helm_deployed_releases(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        self.record(ToolCall::HelmList(namespace.map(str::to_string)));
        Ok(self.releases.lock().unwrap().clone())
    }

    async fn helm_install(&self, release: &HelmRelease) -> Result<String> {
        self.record(ToolCall::HelmInstall(release.clone()));
        let mut releases = self.releases.lock().unwrap();
        if !releases.contains(&release.name) {
            releases.push(release.name.clone());
        }
        Ok(String::new())
    }

    async fn helm_uninstall(&self, name: &str, namespace: Option<&str>) -> Result<bool> {
        self.record(ToolCall::HelmUninstall {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        });
        let mut releases = self.releases.lock().unwrap();
        let before = releases.len();
        releases.retain(|r| r != name);
        Ok(releases.len() != before)
    }

    async fn run_script(&self, script: &Path, workdir: &Path) -> Result<String> {
        self.record(ToolCall::RunScript {
            script: script.to_path_buf(),
            workdir: workdir.to_path_buf(),
            executable: is_executable(script),
        });
        Ok(String::new())
    }
}
