//! Install/uninstall orchestration
//!
//! Steps run strictly in declaration order. Before a step touches a
//! namespace, the namespace is classified (absent, owned, foreign) and the
//! result decides whether the step proceeds:
//!
//! ```text
//!  absent                      -> create it, run the step
//!  foreign                     -> skip with a warning
//!  owned, no reinstall         -> skip with a warning
//!  owned, reinstall requested  -> run the step (helm upgrades)
//! ```
//!
//! A skip at the extension's own namespace skips the whole extension.
//! Failures abort the remaining steps; nothing already applied is rolled
//! back.

use berth_cluster::{
    classify, ClusterOps, GatewayRequest, HelmAction, HelmChart, HelmRelease, NamespaceOwnership,
    ToolRunner,
};
use berth_core::types::{
    ChartSource, ExtensionDescriptor, HelmStep, InstallStep, ManagerConfig, RemovalStep, StepSpec,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::assets::{scratch_dir, AssetResolver};
use crate::error::{ExtensionError, Result};
use crate::waits::WaitEngine;

/// Caller choices for an install
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Re-run steps against namespaces this system already owns
    pub reinstall: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    Skipped { reason: String },
}

/// What happened to one declared step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub extension: String,
    /// The extension namespace was already taken; no step ran
    pub skipped: bool,
    pub steps: Vec<StepRecord>,
    /// Wait conditions evaluated
    pub waits: usize,
    /// Hosts gateways were created for
    pub gateways: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub extension: String,
    /// The extension namespace is foreign; nothing was removed
    pub skipped: bool,
    pub steps: Vec<StepRecord>,
    pub deleted_namespaces: Vec<String>,
    pub warnings: Vec<String>,
}

macro_rules! report_warning {
    ($report:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        warn!("{}", message);
        $report.warnings.push(message);
    }};
}

pub struct Orchestrator {
    cluster: Arc<dyn ClusterOps>,
    tools: Arc<dyn ToolRunner>,
    waits: WaitEngine,
    config: ManagerConfig,
}

impl Orchestrator {
    pub fn new(cluster: Arc<dyn ClusterOps>, tools: Arc<dyn ToolRunner>, config: ManagerConfig) -> Self {
        let waits = WaitEngine::new(cluster.clone(), config.default_timeout());
        Self {
            cluster,
            tools,
            waits,
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Install `name` as described by `descriptor`
    pub async fn install(
        &self,
        name: &str,
        descriptor: &ExtensionDescriptor,
        resolver: &AssetResolver,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        let mut report = InstallReport {
            extension: name.to_string(),
            ..Default::default()
        };
        // namespaces created or taken over during this run
        let mut claimed = BTreeSet::new();
        let top = descriptor.namespace();

        if let Some(ns) = top {
            if let Some(reason) = self.claim_namespace(name, ns, options, &mut claimed).await? {
                report_warning!(report, "{}", reason);
                report.skipped = true;
                return Ok(report);
            }
        }

        for spec in &descriptor.install {
            let label = spec.label();
            let step_ns = step_namespace(spec, top);

            if let Some(ns) = step_ns.filter(|ns| !claimed.contains(*ns)) {
                if let Some(reason) = self.claim_namespace(name, ns, options, &mut claimed).await? {
                    report_warning!(report, "{}; skipping {} step", reason, spec.step_type);
                    report.steps.push(StepRecord {
                        step: label,
                        outcome: StepOutcome::Skipped { reason },
                    });
                    continue;
                }
            }
            let namespace = step_ns.or(top);

            let step = InstallStep::try_from(spec)
                .map_err(|e| ExtensionError::from_step(&spec.step_type, e))?;
            let outcome = self
                .run_install_step(name, &step, namespace, resolver, options)
                .await
                .map_err(|e| ExtensionError::step_failed("install", &label, e))?;
            if let StepOutcome::Skipped { reason } = &outcome {
                report_warning!(report, "{}", reason);
            }

            if let Some(ns) = step_ns {
                self.cluster.label_namespace(ns).await?;
            }

            report.waits += self.waits.wait_all(&spec.wait_for, namespace).await?;
            report.steps.push(StepRecord {
                step: label,
                outcome,
            });
        }

        if let Some(ns) = top {
            self.cluster.label_namespace(ns).await?;
        }

        report.gateways = self.create_gateways(descriptor).await?;

        for rule in &descriptor.role_rules {
            self.cluster
                .grant_role_rule(
                    &self.config.workloads_namespace,
                    &self.config.workloads_role,
                    rule,
                )
                .await?;
        }

        info!("{} deployed", name);
        Ok(report)
    }

    /// Remove `name` by running its uninstall steps
    pub async fn uninstall(
        &self,
        name: &str,
        descriptor: &ExtensionDescriptor,
        resolver: &AssetResolver,
    ) -> Result<UninstallReport> {
        let mut report = UninstallReport {
            extension: name.to_string(),
            ..Default::default()
        };
        let top = descriptor.namespace();

        if let Some(ns) = top {
            if classify(self.cluster.as_ref(), ns).await? == NamespaceOwnership::Foreign {
                report_warning!(
                    report,
                    "Namespace {} was not created by Berth; not deleting extension {}",
                    ns,
                    name
                );
                report.skipped = true;
                return Ok(report);
            }
        }

        for spec in &descriptor.uninstall {
            let label = spec.label();
            let step_ns = step_namespace(spec, top);

            if let Some(ns) = step_ns {
                if classify(self.cluster.as_ref(), ns).await? == NamespaceOwnership::Foreign {
                    let reason = format!("Namespace {} was not created by Berth", ns);
                    report_warning!(
                        report,
                        "{}; skipping {} step of extension {}",
                        reason,
                        spec.step_type,
                        name
                    );
                    report.steps.push(StepRecord {
                        step: label,
                        outcome: StepOutcome::Skipped { reason },
                    });
                    continue;
                }
            }
            let namespace = step_ns.or(top);

            let step = RemovalStep::try_from(spec)
                .map_err(|e| ExtensionError::from_step(&spec.step_type, e))?;
            let outcome = self
                .run_removal_step(name, &step, namespace, resolver)
                .await
                .map_err(|e| ExtensionError::step_failed("uninstall", &label, e))?;
            if let StepOutcome::Skipped { reason } = &outcome {
                report_warning!(report, "{}", reason);
            }
            report.steps.push(StepRecord {
                step: label,
                outcome,
            });

            if let Some(ns) = step_ns.filter(|ns| *ns != self.config.workloads_namespace) {
                self.cluster.delete_namespace(ns).await?;
                report.deleted_namespaces.push(ns.to_string());
            }
        }

        if let Some(ns) = top.filter(|ns| *ns != self.config.workloads_namespace) {
            self.cluster.delete_namespace(ns).await?;
            report.deleted_namespaces.push(ns.to_string());
        }

        info!("{} removed", name);
        Ok(report)
    }

    /// Classify `namespace` and create it when absent
    ///
    /// Returns the reason to skip when the namespace is already taken.
    async fn claim_namespace<'a>(
        &self,
        name: &str,
        namespace: &'a str,
        options: InstallOptions,
        claimed: &mut BTreeSet<&'a str>,
    ) -> Result<Option<String>> {
        match classify(self.cluster.as_ref(), namespace).await? {
            NamespaceOwnership::Absent => {
                self.cluster.create_namespace(namespace).await?;
            }
            NamespaceOwnership::Foreign => {
                return Ok(Some(format!(
                    "Namespace {} is already present and not created by Berth: \
                     assuming extension {} is already installed",
                    namespace, name
                )));
            }
            NamespaceOwnership::Owned if !options.reinstall => {
                return Ok(Some(format!(
                    "Namespace {} is already present: assuming extension {} is already installed",
                    namespace, name
                )));
            }
            NamespaceOwnership::Owned => {
                info!("Namespace {} is already present and reinstall requested", namespace);
            }
        }
        claimed.insert(namespace);
        Ok(None)
    }

    async fn run_install_step(
        &self,
        name: &str,
        step: &InstallStep,
        namespace: Option<&str>,
        resolver: &AssetResolver,
        options: InstallOptions,
    ) -> Result<StepOutcome> {
        let scratch = scratch_dir(&self.config.scratch_prefix)?;

        match step {
            InstallStep::Helm(helm) => {
                self.install_chart(name, helm, namespace, resolver, scratch.path(), options)
                    .await
            }
            InstallStep::Manifest { location } => {
                let manifest = resolver.fetch_file(location, scratch.path()).await?;
                self.tools.apply_manifest(&manifest, namespace).await?;
                Ok(StepOutcome::Applied)
            }
            InstallStep::Kustomize { location } => {
                let overlay = resolver.kustomize_location(location)?;
                self.tools.apply_kustomize(&overlay, namespace).await?;
                Ok(StepOutcome::Applied)
            }
            InstallStep::Script { location } => {
                self.run_script(location, resolver, scratch.path()).await
            }
        }
    }

    async fn run_removal_step(
        &self,
        name: &str,
        step: &RemovalStep,
        namespace: Option<&str>,
        resolver: &AssetResolver,
    ) -> Result<StepOutcome> {
        let scratch = scratch_dir(&self.config.scratch_prefix)?;

        match step {
            RemovalStep::HelmRelease => {
                if self.tools.helm_uninstall(name, namespace).await? {
                    Ok(StepOutcome::Applied)
                } else {
                    Ok(StepOutcome::Skipped {
                        reason: format!("{} helm release not found, skipping", name),
                    })
                }
            }
            RemovalStep::Manifest { location } => {
                let manifest = resolver.fetch_file(location, scratch.path()).await?;
                self.tools.delete_manifest(&manifest, namespace).await?;
                Ok(StepOutcome::Applied)
            }
            RemovalStep::Kustomize { location } => {
                let overlay = resolver.kustomize_location(location)?;
                self.tools.delete_kustomize(&overlay, namespace).await?;
                Ok(StepOutcome::Applied)
            }
            RemovalStep::Script { location } => {
                self.run_script(location, resolver, scratch.path()).await
            }
        }
    }

    async fn install_chart(
        &self,
        name: &str,
        helm: &HelmStep,
        namespace: Option<&str>,
        resolver: &AssetResolver,
        scratch: &Path,
        options: InstallOptions,
    ) -> Result<StepOutcome> {
        let deployed = self.tools.helm_deployed_releases(namespace).await?;
        let action = if deployed.iter().any(|release| release == name) {
            if !options.reinstall {
                return Ok(StepOutcome::Skipped {
                    reason: format!("{} chart already present, skipping installation", name),
                });
            }
            HelmAction::Upgrade
        } else {
            HelmAction::Install
        };

        let chart = match &helm.source {
            ChartSource::Archive(location) => {
                HelmChart::Archive(resolver.fetch_file(location, scratch).await?)
            }
            ChartSource::Repository { repo, chart } => HelmChart::Repository {
                repo: repo.clone(),
                chart: chart.clone(),
            },
        };
        let values = match &helm.values {
            Some(values) => Some(resolver.fetch_file(values, scratch).await?),
            None => None,
        };

        self.tools
            .helm_install(&HelmRelease {
                action,
                name: name.to_string(),
                chart,
                values,
                version: helm.version.clone(),
                namespace: namespace.map(str::to_string),
            })
            .await?;
        Ok(StepOutcome::Applied)
    }

    /// Fetch a script, make it executable and run it inside `scratch`
    async fn run_script(
        &self,
        location: &str,
        resolver: &AssetResolver,
        scratch: &Path,
    ) -> Result<StepOutcome> {
        let script = resolver.fetch_file(location, scratch).await?;
        make_executable(&script).await?;
        self.tools.run_script(&script, scratch).await?;
        Ok(StepOutcome::Applied)
    }

    async fn create_gateways(&self, descriptor: &ExtensionDescriptor) -> Result<Vec<String>> {
        if descriptor.gateways.is_empty() || !self.cluster.has_gateway_support().await? {
            return Ok(Vec::new());
        }
        let domain = self
            .config
            .system_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(ExtensionError::MissingSetting("system domain"))?;

        let mut hosts = Vec::with_capacity(descriptor.gateways.len());
        for gateway in &descriptor.gateways {
            let namespace = Some(gateway.namespace.trim())
                .filter(|ns| !ns.is_empty())
                .or(descriptor.namespace())
                .unwrap_or(self.config.workloads_namespace.as_str());
            let host = gateway.host(domain);
            let service_host = Some(gateway.service_host.trim())
                .filter(|h| !h.is_empty())
                .map(str::to_string);

            self.cluster
                .create_gateway(&GatewayRequest {
                    name: gateway.name.clone(),
                    namespace: namespace.to_string(),
                    host: host.clone(),
                    service_host: service_host.clone(),
                    port: gateway.port,
                })
                .await?;
            if service_host.is_some() {
                info!("{} accessible at http://{}", gateway.name, host);
            }
            hosts.push(host);
        }
        Ok(hosts)
    }
}

/// Step namespace override; one equal to the extension namespace inherits it
fn step_namespace<'a>(spec: &'a StepSpec, top: Option<&str>) -> Option<&'a str> {
    spec.namespace().filter(|ns| Some(*ns) != top)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o740))
        .await
        .map_err(|e| ExtensionError::io(format!("failed changing the file mode of {}", path.display()), e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(namespace: &str) -> StepSpec {
        StepSpec {
            step_type: "manifest".into(),
            location: "app.yaml".into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_step_namespace_inherits_when_equal() {
        assert_eq!(step_namespace(&spec("demo"), Some("demo")), None);
        assert_eq!(step_namespace(&spec(""), Some("demo")), None);
        assert_eq!(step_namespace(&spec("side"), Some("demo")), Some("side"));
        assert_eq!(step_namespace(&spec("side"), None), Some("side"));
    }
}
