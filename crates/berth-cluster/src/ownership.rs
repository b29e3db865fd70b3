//! Namespace ownership classification

use crate::error::Result;
use crate::traits::ClusterOps;
use std::fmt;

/// How a namespace relates to this system
///
/// Always recomputed from the live cluster; never cached across operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceOwnership {
    Absent,
    /// Exists and carries the ownership label
    Owned,
    /// Exists without the ownership label
    Foreign,
}

impl fmt::Display for NamespaceOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NamespaceOwnership::Absent => "absent",
            NamespaceOwnership::Owned => "owned",
            NamespaceOwnership::Foreign => "foreign",
        })
    }
}

/// Classify `namespace` with one existence and at most one ownership query
///
/// The two queries are not atomic; a namespace appearing in between is
/// reported as absent and the subsequent create tolerates it.
pub async fn classify<C: ClusterOps + ?Sized>(
    cluster: &C,
    namespace: &str,
) -> Result<NamespaceOwnership> {
    if !cluster.namespace_exists(namespace).await? {
        return Ok(NamespaceOwnership::Absent);
    }
    if cluster.namespace_owned(namespace).await? {
        Ok(NamespaceOwnership::Owned)
    } else {
        Ok(NamespaceOwnership::Foreign)
    }
}
