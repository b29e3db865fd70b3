//! `berth uninstall`

use super::{cluster_manager, load_extension};
use crate::cli::UninstallArgs;
use crate::output;
use anyhow::{Context, Result};
use berth_core::ManagerConfig;
use berth_extensions::{StepOutcome, UninstallReport};

pub async fn run(args: UninstallArgs, config: ManagerConfig) -> Result<()> {
    let manager = cluster_manager(config)?;
    let extension = load_extension(&manager, &args.extension).await?;

    if args.unregister {
        manager
            .unregister(extension.id())
            .await
            .with_context(|| format!("Failed to unregister {}", extension.id()))?;
    }

    let report = manager
        .uninstall(&extension)
        .await
        .with_context(|| format!("Failed to uninstall {}", extension.name))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &UninstallReport) {
    if report.skipped {
        for warning in &report.warnings {
            output::warning(warning);
        }
        return;
    }

    output::header(&format!("Removed {}", report.extension));
    for record in &report.steps {
        if let StepOutcome::Skipped { reason } = &record.outcome {
            output::kv(&record.step, &format!("skipped ({})", reason));
        }
    }
    for namespace in &report.deleted_namespaces {
        output::kv("namespace deleted", namespace);
    }
    output::success(&format!("{} uninstalled", report.extension));
}
