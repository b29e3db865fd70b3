//! `kubectl`/`helm` backed implementation of [`ToolRunner`]

use crate::command::{args, run};
use crate::error::Result;
use crate::traits::{HelmRelease, ToolRunner};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

const RELEASE_NOT_FOUND: &str = "release: not found";

#[derive(Debug, Default, Clone)]
pub struct CliTools {
    kubectl_path: Option<String>,
    helm_path: Option<String>,
}

impl CliTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kubectl_path(mut self, path: impl Into<String>) -> Self {
        self.kubectl_path = Some(path.into());
        self
    }

    pub fn with_helm_path(mut self, path: impl Into<String>) -> Self {
        self.helm_path = Some(path.into());
        self
    }

    fn kubectl_cmd(&self) -> &str {
        self.kubectl_path.as_deref().unwrap_or("kubectl")
    }

    fn helm_cmd(&self) -> &str {
        self.helm_path.as_deref().unwrap_or("helm")
    }

    async fn kubectl(&self, mut arguments: Vec<String>, namespace: Option<&str>) -> Result<String> {
        if let Some(ns) = namespace {
            arguments.extend(args(["--namespace", ns]));
        }
        Ok(run(self.kubectl_cmd(), &arguments, None, None)
            .await?
            .check()?
            .combined())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl ToolRunner for CliTools {
    async fn apply_manifest(&self, manifest: &Path, namespace: Option<&str>) -> Result<String> {
        self.kubectl(
            vec!["apply".into(), "--filename".into(), path_arg(manifest)],
            namespace,
        )
        .await
    }

    async fn delete_manifest(&self, manifest: &Path, namespace: Option<&str>) -> Result<String> {
        self.kubectl(
            vec![
                "delete".into(),
                "--filename".into(),
                path_arg(manifest),
                "--ignore-not-found".into(),
            ],
            namespace,
        )
        .await
    }

    async fn apply_kustomize(&self, location: &str, namespace: Option<&str>) -> Result<String> {
        self.kubectl(args(["apply", "--kustomize", location]), namespace)
            .await
    }

    async fn delete_kustomize(&self, location: &str, namespace: Option<&str>) -> Result<String> {
        self.kubectl(
            args(["delete", "--kustomize", location, "--ignore-not-found"]),
            namespace,
        )
        .await
    }

    async fn helm_deployed_releases(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        let mut arguments = args(["list"]);
        if let Some(ns) = namespace {
            arguments.extend(args(["--namespace", ns]));
        }
        arguments.extend(args(["--deployed", "-q"]));

        let out = run(self.helm_cmd(), &arguments, None, None).await?.check()?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn helm_install(&self, release: &HelmRelease) -> Result<String> {
        info!("helm {} {}", release.action.as_str(), release.name);
        Ok(run(self.helm_cmd(), &release.args(), None, None)
            .await?
            .check()?
            .combined())
    }

    async fn helm_uninstall(&self, name: &str, namespace: Option<&str>) -> Result<bool> {
        let mut arguments = args(["uninstall", name]);
        if let Some(ns) = namespace {
            arguments.extend(args(["--namespace", ns]));
        }

        let out = run(self.helm_cmd(), &arguments, None, None).await?;
        if !out.success && out.output_contains(RELEASE_NOT_FOUND) {
            warn!("{} helm release not found, skipping", name);
            return Ok(false);
        }
        out.check()?;
        Ok(true)
    }

    async fn run_script(&self, script: &Path, workdir: &Path) -> Result<String> {
        let program = path_arg(script);
        Ok(run(&program, &[], Some(workdir), None)
            .await?
            .check()?
            .combined())
    }
}
