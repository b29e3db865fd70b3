//! `berth register`, `berth unregister` and `berth list`

use super::{cluster_manager, load_extension};
use crate::cli::{ExtensionArgs, UnregisterArgs};
use crate::output;
use anyhow::{Context, Result};
use berth_core::types::RegisteredExtension;
use berth_core::ManagerConfig;
use berth_extensions::ExtensionManager;
use tabled::{settings::Style, Table, Tabled};

pub async fn register(args: ExtensionArgs, config: ManagerConfig) -> Result<()> {
    let manager = cluster_manager(config)?;
    let mut extension = load_extension(&manager, &args).await?;

    let created = manager
        .register(&mut extension)
        .await
        .with_context(|| format!("Failed to register {}", extension.id()))?;
    if created {
        output::success(&format!("Registered {}", extension.id()));
    }
    Ok(())
}

pub async fn unregister(args: UnregisterArgs, config: ManagerConfig) -> Result<()> {
    registry_manager(config)?
        .unregister(&args.id)
        .await
        .with_context(|| format!("Failed to unregister {}", args.id))?;
    output::success(&format!("Unregistered {}", args.id));
    Ok(())
}

pub async fn list(config: ManagerConfig) -> Result<()> {
    let extensions = registry_manager(config)?
        .list_registered()
        .await
        .context("Failed to list registered extensions")?;

    if extensions.is_empty() {
        println!("No extensions registered");
        return Ok(());
    }
    let rows: Vec<ExtensionRow> = extensions.iter().map(ExtensionRow::from).collect();
    println!("{}", Table::new(rows).with(Style::sharp()));
    Ok(())
}

/// Registry-only commands never touch the cluster
fn registry_manager(config: ManagerConfig) -> Result<ExtensionManager> {
    ExtensionManager::with_cli(config).context("Failed to initialize extension manager")
}

#[derive(Tabled)]
struct ExtensionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "PRODUCT")]
    product: String,
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "SERVICES")]
    services: String,
}

impl From<&RegisteredExtension> for ExtensionRow {
    fn from(extension: &RegisteredExtension) -> Self {
        let services: Vec<&str> = extension.services.iter().map(|s| s.id.as_str()).collect();
        Self {
            id: extension.id.clone(),
            product: extension.product.clone().unwrap_or_default(),
            version: extension.version.clone().unwrap_or_default(),
            services: services.join(", "),
        }
    }
}
