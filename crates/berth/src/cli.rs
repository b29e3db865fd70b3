//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Berth - extension lifecycle manager for Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the loaded configuration
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to ~/.berth/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Log retries and command output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Cluster ingress domain
    #[arg(long, global = true)]
    pub system_domain: Option<String>,

    /// Default wait timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install an extension into the cluster
    Install(InstallArgs),

    /// Remove an installed extension
    Uninstall(UninstallArgs),

    /// Register an installed extension with the registry
    Register(ExtensionArgs),

    /// Remove an extension from the registry
    Unregister(UnregisterArgs),

    /// List extensions known to the registry
    List,
}

#[derive(Args, Debug)]
pub struct ExtensionArgs {
    /// Extension name (directory under the repository)
    pub name: String,

    /// Extension repository: local directory or URL
    #[arg(short, long)]
    pub repository: String,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub extension: ExtensionArgs,

    /// Re-run steps against namespaces already managed by Berth
    #[arg(long)]
    pub reinstall: bool,

    /// Register the extension after a successful install
    #[arg(long)]
    pub register: bool,
}

#[derive(Args, Debug)]
pub struct UninstallArgs {
    #[command(flatten)]
    pub extension: ExtensionArgs,

    /// Remove the extension from the registry first
    #[arg(long)]
    pub unregister: bool,
}

#[derive(Args, Debug)]
pub struct UnregisterArgs {
    /// Registry id of the extension
    pub id: String,
}
