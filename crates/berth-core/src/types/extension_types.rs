//! Extension descriptor types matching `description.yaml`
//!
//! Field names follow the lowercase keys used by extension repositories
//! (`waitfor`, `servicecredentials`, `rolerules`, ...); camelCase aliases are
//! accepted as well. Unknown keys are ignored and every field is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::StepSpec;

/// Credential values derived from cluster secrets:
/// service id → credential id → configuration key → value
pub type TransformedCredentials = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Parsed declaration of one extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionDescriptor {
    /// Extension name, also used as registry id and helm release name
    pub name: String,

    /// Product the extension packages (e.g. "mlflow")
    pub product: String,

    /// Product version
    pub version: String,

    /// Human readable description
    pub description: String,

    /// Dedicated namespace; empty means the extension has none
    pub namespace: String,

    /// Availability zone hint passed to the registry
    pub zone: String,

    /// Prerequisite extension names (informational)
    pub requires: Vec<String>,

    /// Ordered install steps
    pub install: Vec<StepSpec>,

    /// Ordered uninstall steps
    pub uninstall: Vec<StepSpec>,

    /// Ingress gateways to expose once installed
    pub gateways: Vec<GatewaySpec>,

    /// Services announced to the registry
    pub services: Vec<ServiceDescriptor>,

    /// Rules deriving credential configuration from cluster secrets
    #[serde(rename = "servicecredentials", alias = "serviceCredentials")]
    pub service_credentials: Vec<ServiceCredentialTemplate>,

    /// RBAC rules granted to the shared workloads role
    #[serde(rename = "rolerules", alias = "roleRules")]
    pub role_rules: Vec<RoleRule>,
}

impl ExtensionDescriptor {
    /// The extension's dedicated namespace, if it declares one
    pub fn namespace(&self) -> Option<&str> {
        non_empty(&self.namespace)
    }

    /// Flatten the `servicecredentials` section into individual rules
    pub fn transform_rules(&self) -> impl Iterator<Item = CredentialTransformRule<'_>> {
        self.service_credentials.iter().flat_map(|service| {
            service.credentials.iter().flat_map(move |credential| {
                credential
                    .transform
                    .iter()
                    .map(move |value| CredentialTransformRule {
                        service_id: &service.service_id,
                        credential_id: &credential.id,
                        config_key: &value.config_value,
                        secret_namespace: &value.namespace,
                        secret_name: &value.secret,
                        secret_field: &value.secret_value,
                    })
            })
        })
    }
}

/// Ingress gateway declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySpec {
    /// Namespace of the exposed service; empty inherits the extension namespace
    pub namespace: String,

    /// Gateway name
    pub name: String,

    /// Service port to route to
    pub port: u16,

    /// Host prefix used instead of the name (e.g. "*.seldon")
    #[serde(rename = "hostprefix", alias = "hostPrefix")]
    pub host_prefix: String,

    /// In-cluster service host traffic is routed to
    #[serde(rename = "servicehost", alias = "serviceHost")]
    pub service_host: String,
}

impl GatewaySpec {
    /// Public hostname for this gateway under `domain`
    pub fn host(&self, domain: &str) -> String {
        match non_empty(&self.host_prefix) {
            Some(prefix) => format!("{}.{}", prefix, domain),
            None => format!("{}.{}", self.name, domain),
        }
    }
}

/// Service an extension exposes to the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDescriptor {
    pub id: String,
    pub resource: String,
    pub category: String,
    pub description: String,
    #[serde(rename = "authrequired", alias = "authRequired")]
    pub auth_required: bool,
    pub endpoints: Vec<EndpointDescriptor>,
    pub credentials: Vec<CredentialDescriptor>,
}

/// Endpoint of a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointDescriptor {
    pub url: String,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    pub configuration: BTreeMap<String, String>,
}

/// Credential set of a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialDescriptor {
    pub id: String,
    pub default: bool,
    pub scope: String,
    pub projects: Vec<String>,
    pub users: Vec<String>,
    pub configuration: BTreeMap<String, String>,
}

/// Transform rules for the credentials of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCredentialTemplate {
    #[serde(rename = "serviceid", alias = "serviceId")]
    pub service_id: String,
    pub credentials: Vec<CredentialTemplate>,
}

/// Transform rules for one credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialTemplate {
    pub id: String,
    pub transform: Vec<CredentialTransformValue>,
}

/// Maps one secret field onto one credential configuration key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialTransformValue {
    /// Target configuration key
    #[serde(rename = "configvalue", alias = "configValue")]
    pub config_value: String,

    /// Field inside the secret's data
    #[serde(rename = "secretvalue", alias = "secretValue")]
    pub secret_value: String,

    /// Secret name
    pub secret: String,

    /// Secret namespace
    pub namespace: String,
}

/// Flattened view of a single credential transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialTransformRule<'a> {
    pub service_id: &'a str,
    pub credential_id: &'a str,
    pub config_key: &'a str,
    pub secret_namespace: &'a str,
    pub secret_name: &'a str,
    pub secret_field: &'a str,
}

/// RBAC rule granted to the workloads role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleRule {
    #[serde(rename = "apigroups", alias = "apiGroups")]
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
