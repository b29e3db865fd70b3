//! Extension manager facade
//!
//! Wires configuration, cluster access, tooling and HTTP together so a
//! caller can load, install, register and remove extensions by name.

use berth_cluster::{CliTools, ClusterOps, KubectlCluster, ToolRunner};
use berth_core::types::{
    ExtensionDescriptor, ManagerConfig, RegisteredExtension, TransformedCredentials,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::assets::{AssetResolver, Repository};
use crate::credentials::CredentialTransformer;
use crate::descriptor::DescriptorLoader;
use crate::error::Result;
use crate::http::HttpClient;
use crate::orchestrator::{InstallOptions, InstallReport, Orchestrator, UninstallReport};
use crate::registry::{registration_payload, RegistryClient};

/// A loaded extension
#[derive(Debug, Clone)]
pub struct Extension {
    /// Name the extension was requested by; also its directory and release name
    pub name: String,
    pub descriptor: ExtensionDescriptor,
    /// Filled in during registration
    pub transformed_credentials: TransformedCredentials,
    resolver: AssetResolver,
}

impl Extension {
    /// Id used with the registry
    pub fn id(&self) -> &str {
        let declared = self.descriptor.name.trim();
        if declared.is_empty() {
            self.name.as_str()
        } else {
            declared
        }
    }

    pub fn repository(&self) -> &Repository {
        self.resolver.repository()
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }
}

pub struct ExtensionManager {
    config: ManagerConfig,
    cluster: Arc<dyn ClusterOps>,
    downloads: HttpClient,
    orchestrator: Orchestrator,
}

impl ExtensionManager {
    pub fn new(
        config: ManagerConfig,
        cluster: Arc<dyn ClusterOps>,
        tools: Arc<dyn ToolRunner>,
    ) -> Result<Self> {
        let downloads = HttpClient::new(
            &config.network.user_agent,
            Duration::from_secs(config.network.download_timeout_secs),
            config.retry.clone(),
            config.debug,
        )?;
        let orchestrator = Orchestrator::new(cluster.clone(), tools, config.clone());
        Ok(Self {
            config,
            cluster,
            downloads,
            orchestrator,
        })
    }

    /// Manager backed by `kubectl` and `helm` from `PATH`
    pub fn with_cli(config: ManagerConfig) -> Result<Self> {
        let cluster = Arc::new(KubectlCluster::new(config.ownership_label.clone()));
        Self::new(config, cluster, Arc::new(CliTools::new()))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Resolver for extension `name` under `repository`
    pub fn resolver(&self, name: &str, repository: &str) -> Result<AssetResolver> {
        Ok(AssetResolver::new(
            Repository::parse(repository)?,
            name,
            self.downloads.clone(),
        ))
    }

    /// Load the descriptor of `name` from `repository`
    pub async fn load(&self, name: &str, repository: &str) -> Result<Extension> {
        let resolver = self.resolver(name, repository)?;
        let descriptor = DescriptorLoader::new(&self.config).load(&resolver).await?;
        Ok(Extension {
            name: name.to_string(),
            descriptor,
            transformed_credentials: TransformedCredentials::new(),
            resolver,
        })
    }

    pub async fn install(&self, extension: &Extension, options: InstallOptions) -> Result<InstallReport> {
        info!("Installing extension {}", extension.name);
        self.orchestrator
            .install(
                &extension.name,
                &extension.descriptor,
                &extension.resolver,
                options,
            )
            .await
    }

    pub async fn uninstall(&self, extension: &Extension) -> Result<UninstallReport> {
        info!("Removing extension {}", extension.name);
        self.orchestrator
            .uninstall(&extension.name, &extension.descriptor, &extension.resolver)
            .await
    }

    /// Register with the registry; `false` when it was already registered
    ///
    /// Credential transforms are resolved only when a registration will
    /// actually be sent.
    pub async fn register(&self, extension: &mut Extension) -> Result<bool> {
        let registry = RegistryClient::from_config(&self.config)?;
        let id = extension.id().to_string();

        if registry.is_registered(&id).await? {
            warn!(
                "Extension {} is already registered; if you want to update it, delete it first",
                id
            );
            return Ok(false);
        }

        extension.transformed_credentials = CredentialTransformer::new(self.cluster.clone())
            .resolve(&extension.descriptor)
            .await?;
        registry
            .create(&registration_payload(
                &id,
                &extension.descriptor,
                &extension.transformed_credentials,
            ))
            .await?;
        Ok(true)
    }

    pub async fn unregister(&self, id: &str) -> Result<()> {
        RegistryClient::from_config(&self.config)?.unregister(id).await
    }

    pub async fn list_registered(&self) -> Result<Vec<RegisteredExtension>> {
        RegistryClient::from_config(&self.config)?
            .list_registered()
            .await
    }
}
