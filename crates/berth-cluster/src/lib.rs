//! Cluster capability interface for Berth
//!
//! The extension orchestrator never talks to Kubernetes directly. It
//! consumes two traits defined here:
//!
//! - [`ClusterOps`] - namespace existence/ownership/labels, secrets,
//!   readiness waits, ingress gateways and RBAC grants
//! - [`ToolRunner`] - manifest and overlay apply/delete, helm releases and
//!   install scripts
//!
//! Default implementations shell out to `kubectl`, `helm` and the scripts
//! themselves:
//!
//! ```text
//! ClusterOps (trait)      ToolRunner (trait)
//! └── KubectlCluster      └── CliTools
//! ```
//!
//! Namespace decisions go through [`classify`], which folds the existence
//! and ownership queries into one [`NamespaceOwnership`] value.

mod command;
pub mod error;
pub mod kubectl;
pub mod ownership;
pub mod tools;
pub mod traits;

pub use error::{ClusterError, Result};
pub use kubectl::KubectlCluster;
pub use ownership::{classify, NamespaceOwnership};
pub use tools::CliTools;
pub use traits::{ClusterOps, GatewayRequest, HelmAction, HelmChart, HelmRelease, ToolRunner};
