//! Loading `description.yaml`

use berth_core::types::{ExtensionDescriptor, ManagerConfig};
use tracing::debug;

use crate::assets::{scratch_dir, AssetResolver, Repository};
use crate::error::{ExtensionError, Result};

/// Locates and parses the description document of an extension
///
/// Only parsing happens here. Step types and fields are validated when each
/// step runs, so a bad step fails on its own.
#[derive(Debug, Clone)]
pub struct DescriptorLoader {
    description_file: String,
    scratch_prefix: String,
}

impl DescriptorLoader {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            description_file: config.description_file.clone(),
            scratch_prefix: config.scratch_prefix.clone(),
        }
    }

    /// Fetch `<repository>/<extension>/<description file>` and parse it
    pub async fn load(&self, resolver: &AssetResolver) -> Result<ExtensionDescriptor> {
        if let Repository::Local(root) = resolver.repository() {
            if !root.is_dir() {
                return Err(ExtensionError::fetch(
                    root.display().to_string(),
                    "extension repository is neither a URL nor a directory",
                ));
            }
        }

        let scratch = scratch_dir(&self.scratch_prefix)?;
        let path = resolver
            .fetch_file(&self.description_file, scratch.path())
            .await?;
        debug!("Loading description of {} from {}", resolver.extension(), path.display());

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ExtensionError::DescriptorRead {
                path: path.clone(),
                source,
            })?;
        parse_descriptor(&text, &format!("{}/{}", resolver.repository(), resolver.extension()))
    }
}

/// Parse description document text; `location` is used in errors only
pub fn parse_descriptor(text: &str, location: &str) -> Result<ExtensionDescriptor> {
    serde_yaml_ng::from_str(text).map_err(|source| ExtensionError::DescriptorParse {
        location: location.to_string(),
        source,
    })
}
