//! `berth install`

use super::{cluster_manager, load_extension};
use crate::cli::InstallArgs;
use crate::output;
use anyhow::{Context, Result};
use berth_core::ManagerConfig;
use berth_extensions::{InstallOptions, InstallReport, StepOutcome};
use tracing::info;

pub async fn run(args: InstallArgs, config: ManagerConfig) -> Result<()> {
    let manager = cluster_manager(config)?;
    let mut extension = load_extension(&manager, &args.extension).await?;

    let options = InstallOptions {
        reinstall: args.reinstall,
    };
    let report = manager
        .install(&extension, options)
        .await
        .with_context(|| format!("Failed to install {}", extension.name))?;
    print_report(&report);

    if args.register && !report.skipped {
        info!("Registering {}", extension.id());
        let created = manager
            .register(&mut extension)
            .await
            .with_context(|| format!("Failed to register {}", extension.id()))?;
        if created {
            output::success(&format!("Registered {}", extension.id()));
        }
    }
    Ok(())
}

fn print_report(report: &InstallReport) {
    if report.skipped {
        for warning in &report.warnings {
            output::warning(warning);
        }
        return;
    }

    output::header(&format!("Installed {}", report.extension));
    for record in &report.steps {
        match &record.outcome {
            StepOutcome::Applied => output::kv(&record.step, "applied"),
            StepOutcome::Skipped { reason } => {
                output::kv(&record.step, &format!("skipped ({})", reason))
            }
        }
    }
    if report.waits > 0 {
        output::kv("waits", &report.waits.to_string());
    }
    for host in &report.gateways {
        output::kv("gateway", host);
    }
    output::success(&format!("{} installed", report.extension));
}
