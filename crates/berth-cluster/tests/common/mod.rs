//! Shared test utilities for berth-cluster integration tests
//!
//! Tests run the real `KubectlCluster` / `CliTools` against small shell
//! scripts standing in for `kubectl` and `helm`. Each script appends its
//! arguments to a log file so tests can assert on the exact invocations.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fake CLI binary plus the log of its invocations
pub struct FakeCli {
    pub dir: TempDir,
    pub binary: PathBuf,
    pub log: PathBuf,
}

impl FakeCli {
    /// Create a fake binary whose body is a `case "$*" in ... esac` block
    pub fn new(name: &str, cases: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join(name);
        let log = dir.path().join(format!("{}.log", name));

        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{log}'\ncase \"$*\" in\n{cases}\n*) ;;\nesac\n",
            log = log.display(),
            cases = cases,
        );
        fs::write(&binary, script).unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, binary, log }
    }

    pub fn path(&self) -> String {
        self.binary.display().to_string()
    }

    /// Invocations so far, one argument string per call
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
