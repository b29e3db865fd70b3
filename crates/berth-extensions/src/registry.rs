//! Client for the extension registry
//!
//! | operation  | request                     | success  |
//! |------------|-----------------------------|----------|
//! | query one  | `GET /extensions/{id}`      | 200, 404 |
//! | list all   | `GET /extensions`           | 200      |
//! | register   | `POST /extensions`          | 201      |
//! | unregister | `DELETE /extensions/{id}`   | 204, 404 |
//!
//! Transport failures and transient statuses are retried; retries are
//! logged only in debug mode.

use berth_core::types::{
    ExtensionDescriptor, ManagerConfig, RegisteredCredentials, RegisteredEndpoint,
    RegisteredExtension, RegisteredService, TransformedCredentials,
};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::error::{ExtensionError, Result};
use crate::http::{HttpClient, HttpFailure};

pub struct RegistryClient {
    base: Url,
    http: HttpClient,
}

impl RegistryClient {
    /// Client for the registry configured in `config`
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        let base_url = config
            .registry_url()
            .ok_or(ExtensionError::MissingSetting("system domain or registry URL"))?;
        Self::new(base_url, config)
    }

    /// Client for the registry at `base_url`, with HTTP settings from `config`
    pub fn new(base_url: impl Into<String>, config: &ManagerConfig) -> Result<Self> {
        let base_url = base_url.into();
        let base = Url::parse(&base_url)
            .and_then(|url| {
                if url.cannot_be_a_base() {
                    Err(url::ParseError::RelativeUrlWithCannotBeABaseBase)
                } else {
                    Ok(url)
                }
            })
            .map_err(|source| ExtensionError::InvalidUrl {
                url: base_url.clone(),
                source,
            })?;
        let http = HttpClient::new(
            &config.network.user_agent,
            Duration::from_secs(config.network.http_timeout_secs),
            config.retry.clone(),
            config.debug,
        )?;
        Ok(Self { base, http })
    }

    fn extensions_url(&self) -> Url {
        self.endpoint(None)
    }

    /// `id` is pushed as a single escaped path segment
    fn extension_url(&self, id: &str) -> Url {
        self.endpoint(Some(id))
    }

    fn endpoint(&self, id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("extensions");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    pub async fn is_registered(&self, id: &str) -> Result<bool> {
        let operation = format!("query {}", id);
        let url = self.extension_url(id);
        let response = self
            .http
            .send(&operation, |client| client.get(url.clone()))
            .await
            .map_err(|e| request_error(&operation, e))?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(unexpected(&operation, status, response).await),
        }
    }

    /// POST a registration payload
    pub async fn create(&self, extension: &RegisteredExtension) -> Result<()> {
        let operation = format!("register {}", extension.id);
        let url = self.extensions_url();
        let response = self
            .http
            .send(&operation, |client| client.post(url.clone()).json(extension))
            .await
            .map_err(|e| request_error(&operation, e))?;

        match response.status().as_u16() {
            201 => {
                info!("Registered extension {}", extension.id);
                Ok(())
            }
            status => Err(unexpected(&operation, status, response).await),
        }
    }

    /// Remove a registration; an unknown id is not an error
    pub async fn unregister(&self, id: &str) -> Result<()> {
        let operation = format!("unregister {}", id);
        let url = self.extension_url(id);
        let response = self
            .http
            .send(&operation, |client| client.delete(url.clone()))
            .await
            .map_err(|e| request_error(&operation, e))?;

        match response.status().as_u16() {
            204 => {
                info!("Unregistered extension {}", id);
                Ok(())
            }
            404 => {
                info!("Extension {} was not registered", id);
                Ok(())
            }
            status => Err(unexpected(&operation, status, response).await),
        }
    }

    pub async fn list_registered(&self) -> Result<Vec<RegisteredExtension>> {
        let operation = "list extensions".to_string();
        let url = self.extensions_url();
        let response = self
            .http
            .send(&operation, |client| client.get(url.clone()))
            .await
            .map_err(|e| request_error(&operation, e))?;

        match response.status().as_u16() {
            200 => response.json().await.map_err(|e| ExtensionError::Http {
                operation,
                message: format!("invalid response body: {}", e),
            }),
            status => Err(unexpected(&operation, status, response).await),
        }
    }
}

fn request_error(operation: &str, failure: HttpFailure) -> ExtensionError {
    match failure {
        HttpFailure::Status { status, body } => ExtensionError::Registry {
            operation: operation.to_string(),
            status,
            body,
        },
        other => ExtensionError::Http {
            operation: operation.to_string(),
            message: other.to_string(),
        },
    }
}

async fn unexpected(operation: &str, status: u16, response: reqwest::Response) -> ExtensionError {
    ExtensionError::Registry {
        operation: operation.to_string(),
        status,
        body: response.text().await.unwrap_or_default(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Registration body for `descriptor`
///
/// Transform-derived credential values override static configuration of
/// the same key.
pub fn registration_payload(
    id: &str,
    descriptor: &ExtensionDescriptor,
    transformed: &TransformedCredentials,
) -> RegisteredExtension {
    let services = descriptor
        .services
        .iter()
        .map(|service| {
            let endpoints = service
                .endpoints
                .iter()
                .map(|endpoint| RegisteredEndpoint {
                    url: endpoint.url.clone(),
                    endpoint_type: non_empty(&endpoint.endpoint_type),
                    configuration: endpoint.configuration.clone(),
                    ..Default::default()
                })
                .collect();

            let credentials = service
                .credentials
                .iter()
                .map(|credential| {
                    let mut configuration = credential.configuration.clone();
                    if let Some(values) = transformed
                        .get(&service.id)
                        .and_then(|creds| creds.get(&credential.id))
                    {
                        configuration.extend(values.clone());
                    }
                    RegisteredCredentials {
                        id: credential.id.clone(),
                        default: credential.default,
                        scope: non_empty(&credential.scope),
                        projects: credential.projects.clone(),
                        users: credential.users.clone(),
                        configuration,
                        ..Default::default()
                    }
                })
                .collect();

            RegisteredService {
                id: service.id.clone(),
                resource: non_empty(&service.resource),
                category: non_empty(&service.category),
                description: non_empty(&service.description),
                auth_required: service.auth_required,
                endpoints,
                credentials,
                ..Default::default()
            }
        })
        .collect();

    RegisteredExtension {
        id: id.to_string(),
        product: non_empty(&descriptor.product),
        version: non_empty(&descriptor.version),
        description: non_empty(&descriptor.description),
        zone: non_empty(&descriptor.zone),
        services,
        ..Default::default()
    }
}
