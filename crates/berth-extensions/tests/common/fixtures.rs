//! Scratch extension repositories and manager construction

#![allow(dead_code)]

use berth_cluster::{ClusterOps, ToolRunner};
use berth_core::types::{ManagerConfig, RetryPolicy, RetryStrategy};
use berth_extensions::ExtensionManager;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use super::mocks::{MockCluster, MockTools};

pub const WORKLOADS_NAMESPACE: &str = "berth-workloads";
pub const SYSTEM_DOMAIN: &str = "10.0.0.1.nip.io";

/// Local extension repository laid out as `<root>/<extension>/<file>`
pub struct ExtensionRepo {
    pub dir: TempDir,
}

impl ExtensionRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Repository under the current directory, addressed as `./<name>`
    pub fn in_current_dir() -> Self {
        Self {
            dir: tempfile::tempdir_in(".").unwrap(),
        }
    }

    pub fn relative_root(&self) -> String {
        let name = self.dir.path().file_name().unwrap().to_string_lossy();
        format!("./{}", name)
    }

    /// Write `<extension>/description.yaml`
    pub fn with_extension(self, extension: &str, description: &str) -> Self {
        self.with_file(extension, "description.yaml", description)
    }

    pub fn with_file(self, extension: &str, relative: &str, content: &str) -> Self {
        let path = self.dir.path().join(extension).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    pub fn root(&self) -> String {
        self.dir.path().display().to_string()
    }

    pub fn file(&self, extension: &str, relative: &str) -> PathBuf {
        self.dir.path().join(extension).join(relative)
    }
}

/// Configuration with fast retries and a known domain
pub fn test_config() -> ManagerConfig {
    ManagerConfig {
        workloads_namespace: WORKLOADS_NAMESPACE.to_string(),
        system_domain: Some(SYSTEM_DOMAIN.to_string()),
        default_timeout_secs: 30,
        retry: RetryPolicy {
            max_attempts: 2,
            strategy: RetryStrategy::FixedDelay,
            initial_delay_ms: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn manager_with(
    config: ManagerConfig,
    cluster: &Arc<MockCluster>,
    tools: &Arc<MockTools>,
) -> ExtensionManager {
    let cluster: Arc<dyn ClusterOps> = cluster.clone();
    let tools: Arc<dyn ToolRunner> = tools.clone();
    ExtensionManager::new(config, cluster, tools).unwrap()
}

pub fn manager(cluster: &Arc<MockCluster>, tools: &Arc<MockTools>) -> ExtensionManager {
    manager_with(test_config(), cluster, tools)
}
