//! Command implementations

pub mod install;
pub mod registry;
pub mod uninstall;

use crate::cli::{ExtensionArgs, GlobalArgs};
use anyhow::{anyhow, Context, Result};
use berth_core::{ConfigLoader, ManagerConfig};
use berth_extensions::{Extension, ExtensionManager};

/// Tools the cluster-facing commands shell out to
const REQUIRED_TOOLS: &[&str] = &["kubectl", "helm"];

/// Load configuration and apply command-line overrides
pub fn load_config(global: &GlobalArgs) -> Result<ManagerConfig> {
    let loader = ConfigLoader::new().context("Failed to locate configuration directory")?;
    let mut config = match &global.config {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Configuration file not found: {}", path));
            }
            loader.load_with_file(path)
        }
        None => loader.load(),
    }
    .context("Failed to load configuration")?;

    apply_overrides(&mut config, global);
    Ok(config)
}

fn apply_overrides(config: &mut ManagerConfig, global: &GlobalArgs) {
    if global.debug {
        config.debug = true;
    }
    if let Some(domain) = &global.system_domain {
        config.system_domain = Some(domain.clone());
    }
    if let Some(timeout) = global.timeout {
        config.default_timeout_secs = timeout;
    }
}

/// Fail early when kubectl or helm are not on PATH
pub fn check_tools() -> Result<()> {
    let missing: Vec<&str> = REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "Required tools not found on PATH: {}",
            missing.join(", ")
        ))
    }
}

/// Build a manager backed by kubectl/helm after checking they exist
pub fn cluster_manager(config: ManagerConfig) -> Result<ExtensionManager> {
    check_tools()?;
    ExtensionManager::with_cli(config).context("Failed to initialize extension manager")
}

pub async fn load_extension(
    manager: &ExtensionManager,
    args: &ExtensionArgs,
) -> Result<Extension> {
    manager
        .load(&args.name, &args.repository)
        .await
        .with_context(|| {
            format!(
                "Failed to load extension {} from {}",
                args.name, args.repository
            )
        })
}
