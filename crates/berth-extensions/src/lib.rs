//! Extension lifecycle management for Berth
//!
//! This crate handles:
//! - Resolving descriptor and asset references (local, absolute, remote)
//! - Loading `description.yaml` into an [`ExtensionDescriptor`]
//! - Install/uninstall orchestration with namespace ownership rules
//! - Post-step wait conditions
//! - Credential transforms from cluster secrets
//! - Registering extensions with the remote registry
//!
//! [`ExtensionDescriptor`]: berth_core::types::ExtensionDescriptor

pub mod assets;
pub mod credentials;
pub mod descriptor;
pub mod error;
mod http;
pub mod manager;
pub mod orchestrator;
pub mod registry;
pub mod waits;

pub use assets::{rewrite_raw_content_url, AssetResolver, Repository};
pub use credentials::CredentialTransformer;
pub use descriptor::DescriptorLoader;
pub use error::{ExtensionError, Result};
pub use manager::{Extension, ExtensionManager};
pub use orchestrator::{
    InstallOptions, InstallReport, Orchestrator, StepOutcome, StepRecord, UninstallReport,
};
pub use registry::RegistryClient;
pub use waits::WaitEngine;
