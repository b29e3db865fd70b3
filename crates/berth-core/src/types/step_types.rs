//! Install step declarations and their typed, validated form
//!
//! `StepSpec` is what the descriptor document carries: a flat record with a
//! string discriminant. `InstallStep` is the variant the orchestrator runs;
//! conversion happens when a step is about to execute so that a bad step
//! fails on its own rather than rejecting the whole descriptor upfront.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::extension_types::non_empty;

/// Kind of resource waited on when a wait entry leaves it empty
pub const DEFAULT_WAIT_KIND: &str = "pod";

/// Condition waited for when a wait entry leaves it empty
pub const DEFAULT_WAIT_CONDITION: &str = "Ready";

/// Step entry as written in `description.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSpec {
    /// One of `helm`, `manifest`, `kustomize`, `script`
    #[serde(rename = "type")]
    pub step_type: String,

    /// File or directory reference, or a chart archive for helm
    pub location: String,

    /// Helm chart repository URL
    pub repo: String,

    /// Helm chart name inside `repo`
    pub chart: String,

    /// Helm values file reference
    pub values: String,

    /// Helm chart version pin
    pub version: String,

    /// Namespace override; empty inherits the extension namespace
    pub namespace: String,

    /// Readiness conditions evaluated in order after the step
    #[serde(rename = "waitfor", alias = "waitFor", alias = "wait_for")]
    pub wait_for: Vec<WaitForSpec>,
}

impl StepSpec {
    /// Namespace override declared on the step, if any
    pub fn namespace(&self) -> Option<&str> {
        non_empty(&self.namespace)
    }

    /// Short label used in logs and error context, e.g. `helm (charts/x.tgz)`
    pub fn label(&self) -> String {
        let target = [&self.location, &self.chart]
            .into_iter()
            .find_map(|v| non_empty(v));
        match target {
            Some(target) => format!("{} ({})", self.step_type, target),
            None => self.step_type.clone(),
        }
    }
}

/// Closed set of supported step kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Helm,
    Manifest,
    Kustomize,
    Script,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Helm => "helm",
            StepKind::Manifest => "manifest",
            StepKind::Kustomize => "kustomize",
            StepKind::Script => "script",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "helm" => Ok(StepKind::Helm),
            "manifest" => Ok(StepKind::Manifest),
            "kustomize" => Ok(StepKind::Kustomize),
            "script" => Ok(StepKind::Script),
            other => Err(StepError::UnsupportedType(other.to_string())),
        }
    }
}

/// Reasons a `StepSpec` cannot become an `InstallStep`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Unsupported step type: {0}")]
    UnsupportedType(String),

    #[error("Neither chart repository nor chart location was provided")]
    MissingChartSource,

    #[error("Chart name not provided for repository {repo}")]
    MissingChartName { repo: String },

    #[error("{kind} step requires a location")]
    MissingLocation { kind: StepKind },
}

/// Where a helm chart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    /// Chart archive reference, resolved through the asset resolver
    Archive(String),
    /// Named chart in a chart repository
    Repository { repo: String, chart: String },
}

/// Helm release step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmStep {
    pub source: ChartSource,
    pub values: Option<String>,
    pub version: Option<String>,
}

/// Validated install step, carrying only the fields its kind uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStep {
    Helm(HelmStep),
    Manifest { location: String },
    Kustomize { location: String },
    Script { location: String },
}

impl InstallStep {
    pub fn kind(&self) -> StepKind {
        match self {
            InstallStep::Helm(_) => StepKind::Helm,
            InstallStep::Manifest { .. } => StepKind::Manifest,
            InstallStep::Kustomize { .. } => StepKind::Kustomize,
            InstallStep::Script { .. } => StepKind::Script,
        }
    }
}

impl TryFrom<&StepSpec> for InstallStep {
    type Error = StepError;

    fn try_from(spec: &StepSpec) -> Result<Self, Self::Error> {
        let kind: StepKind = spec.step_type.parse()?;
        let location = || {
            non_empty(&spec.location)
                .map(str::to_string)
                .ok_or(StepError::MissingLocation { kind })
        };

        match kind {
            StepKind::Helm => {
                // A chart archive wins over a repository reference
                let source = match (non_empty(&spec.location), non_empty(&spec.repo)) {
                    (Some(location), _) => ChartSource::Archive(location.to_string()),
                    (None, Some(repo)) => match non_empty(&spec.chart) {
                        Some(chart) => ChartSource::Repository {
                            repo: repo.to_string(),
                            chart: chart.to_string(),
                        },
                        None => {
                            return Err(StepError::MissingChartName {
                                repo: repo.to_string(),
                            })
                        }
                    },
                    (None, None) => return Err(StepError::MissingChartSource),
                };
                Ok(InstallStep::Helm(HelmStep {
                    source,
                    values: non_empty(&spec.values).map(str::to_string),
                    version: non_empty(&spec.version).map(str::to_string),
                }))
            }
            StepKind::Manifest => Ok(InstallStep::Manifest {
                location: location()?,
            }),
            StepKind::Kustomize => Ok(InstallStep::Kustomize {
                location: location()?,
            }),
            StepKind::Script => Ok(InstallStep::Script {
                location: location()?,
            }),
        }
    }
}

/// Validated uninstall step
///
/// Helm removal targets the release named after the extension, so unlike
/// [`InstallStep`] it needs no chart source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalStep {
    HelmRelease,
    Manifest { location: String },
    Kustomize { location: String },
    Script { location: String },
}

impl RemovalStep {
    pub fn kind(&self) -> StepKind {
        match self {
            RemovalStep::HelmRelease => StepKind::Helm,
            RemovalStep::Manifest { .. } => StepKind::Manifest,
            RemovalStep::Kustomize { .. } => StepKind::Kustomize,
            RemovalStep::Script { .. } => StepKind::Script,
        }
    }
}

impl TryFrom<&StepSpec> for RemovalStep {
    type Error = StepError;

    fn try_from(spec: &StepSpec) -> Result<Self, Self::Error> {
        let kind: StepKind = spec.step_type.parse()?;
        if kind == StepKind::Helm {
            return Ok(RemovalStep::HelmRelease);
        }

        let location = non_empty(&spec.location)
            .map(str::to_string)
            .ok_or(StepError::MissingLocation { kind })?;
        Ok(match kind {
            StepKind::Manifest => RemovalStep::Manifest { location },
            StepKind::Kustomize => RemovalStep::Kustomize { location },
            _ => RemovalStep::Script { location },
        })
    }
}

/// Wait-for entry as written in `description.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitForSpec {
    /// Resource kind, `pod` when empty
    pub kind: String,

    /// Namespace of the watched resources; empty uses the step namespace
    pub namespace: String,

    /// Condition name, `Ready` when empty
    pub condition: String,

    /// `all` or a label selector
    pub selector: String,

    /// Timeout in seconds; 0 uses the configured default
    pub timeout: u64,
}

impl WaitForSpec {
    /// Apply defaults and produce a concrete wait condition
    pub fn resolve(&self, fallback_namespace: Option<&str>, default_timeout: Duration) -> WaitCondition {
        let timeout = if self.timeout == 0 {
            default_timeout
        } else {
            Duration::from_secs(self.timeout)
        };

        WaitCondition {
            kind: non_empty(&self.kind).unwrap_or(DEFAULT_WAIT_KIND).to_string(),
            namespace: non_empty(&self.namespace)
                .or(fallback_namespace)
                .map(str::to_string),
            condition: non_empty(&self.condition)
                .unwrap_or(DEFAULT_WAIT_CONDITION)
                .to_string(),
            selector: Selector::parse(&self.selector),
            timeout,
        }
    }
}

/// Resource selection for a wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Label(String),
}

impl Selector {
    pub fn parse(value: &str) -> Self {
        match non_empty(value) {
            None | Some("all") => Selector::All,
            Some(label) => Selector::Label(label.to_string()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Label(label) => f.write_str(label),
        }
    }
}

/// Wait entry with every default applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitCondition {
    pub kind: String,
    pub namespace: Option<String>,
    pub condition: String,
    pub selector: Selector,
    pub timeout: Duration,
}

impl WaitCondition {
    /// Pods matched by a label must exist before readiness is checked
    pub fn needs_existence_check(&self) -> bool {
        self.kind == DEFAULT_WAIT_KIND && matches!(self.selector, Selector::Label(_))
    }
}
