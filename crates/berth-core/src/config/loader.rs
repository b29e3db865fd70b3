//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.berth/config.yaml)
//! 3. Environment variables (BERTH_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::ManagerConfig;
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;
use std::env;
use std::fs;

const DEFAULTS_FILE: &str = "manager-defaults.yaml";
const USER_CONFIG_FILE: &str = "config.yaml";

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Configuration hierarchy loader
pub struct ConfigLoader {
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Loader rooted at `~/.berth`
    pub fn new() -> Result<Self> {
        let home = get_home_dir().map_err(|e| Error::invalid_config(e.to_string()))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 home directory: {}", p.display())))?;
        Ok(Self {
            config_dir: home.join(".berth"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load configuration from defaults, the user file and the environment
    pub fn load(&self) -> Result<ManagerConfig> {
        self.load_with_file(&self.config_dir.join(USER_CONFIG_FILE))
    }

    /// Same as [`load`](Self::load) but reading an explicit overlay file.
    ///
    /// A missing file is fine for the default location; callers passing an
    /// explicit path should check existence themselves.
    pub fn load_with_file(&self, path: &Utf8Path) -> Result<ManagerConfig> {
        let mut merged = Self::load_embedded_value(DEFAULTS_FILE)?;

        if path.exists() {
            let content = fs::read_to_string(path)?;
            let overlay: Value = serde_yaml_ng::from_str(&content)
                .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
            merge_values(&mut merged, overlay);
        }

        let config: ManagerConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Invalid configuration: {}", e)))?;

        apply_env_overrides(config)
    }

    fn load_embedded_value(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!("Failed to parse embedded config {}: {}", filename, e))
        })
    }
}

/// Recursively overlay mappings; anything else in `overlay` replaces `base`
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(mut config: ManagerConfig) -> Result<ManagerConfig> {
    if let Ok(val) = env::var("BERTH_WORKLOADS_NAMESPACE") {
        config.workloads_namespace = val;
    }

    if let Ok(val) = env::var("BERTH_SYSTEM_DOMAIN") {
        config.system_domain = Some(val);
    }

    if let Ok(val) = env::var("BERTH_REGISTRY_URL") {
        config.registry.url = Some(val);
    }

    if let Ok(val) = env::var("BERTH_DEFAULT_TIMEOUT_SECS") {
        config.default_timeout_secs = val.parse().map_err(|_| {
            Error::invalid_config("BERTH_DEFAULT_TIMEOUT_SECS must be a valid number")
        })?;
    }

    if let Ok(val) = env::var("BERTH_HTTP_TIMEOUT_SECS") {
        config.network.http_timeout_secs = val
            .parse()
            .map_err(|_| Error::invalid_config("BERTH_HTTP_TIMEOUT_SECS must be a valid number"))?;
    }

    if let Ok(val) = env::var("BERTH_DEBUG") {
        config.debug = val
            .parse()
            .map_err(|_| Error::invalid_config("BERTH_DEBUG must be true or false"))?;
    }

    Ok(config)
}
