//! Registry client tests against a wiremock registry

mod common;

use berth_core::types::{ManagerConfig, RegisteredExtension, TransformedCredentials};
use berth_extensions::descriptor::parse_descriptor;
use berth_extensions::registry::registration_payload;
use berth_extensions::{ExtensionError, RegistryClient};
use common::*;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MINIO: &str = r#"
name: minio
product: minio
version: "8.0.10"
description: S3 compatible object storage
namespace: minio
services:
  - id: s3
    resource: s3
    category: object-storage
    authrequired: true
    endpoints:
      - url: http://minio.minio:9000
        type: internal
    credentials:
      - id: default-s3-account
        scope: global
        configuration:
          AWS_DEFAULT_REGION: us-east-1
servicecredentials:
  - serviceid: s3
    credentials:
      - id: default-s3-account
        transform:
          - configvalue: AWS_ACCESS_KEY_ID
            secret: minio
            namespace: minio
            secretvalue: accesskey
          - configvalue: AWS_SECRET_ACCESS_KEY
            secret: minio
            namespace: minio
            secretvalue: secretkey
"#;

fn registry_config(server: &MockServer) -> ManagerConfig {
    let mut config = test_config();
    config.registry.url = Some(server.uri());
    config
}

fn client(server: &MockServer) -> RegistryClient {
    RegistryClient::new(server.uri(), &test_config()).unwrap()
}

async fn mount_lookup(server: &MockServer, id: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/extensions/{}", id)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_is_registered_statuses() {
    let server = MockServer::start().await;
    mount_lookup(&server, "present", 200).await;
    mount_lookup(&server, "absent", 404).await;
    mount_lookup(&server, "teapot", 418).await;
    let client = client(&server);

    assert!(client.is_registered("present").await.unwrap());
    assert!(!client.is_registered("absent").await.unwrap());
    let err = client.is_registered("teapot").await.unwrap_err();
    assert!(matches!(err, ExtensionError::Registry { status: 418, .. }));
}

#[tokio::test]
async fn test_unregister_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/extensions/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/extensions/mlflow"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);

    client.unregister("gone").await.unwrap();
    client.unregister("mlflow").await.unwrap();
}

#[tokio::test]
async fn test_unregister_failure_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/extensions/locked"))
        .respond_with(ResponseTemplate::new(409).set_body_string("extension has active runnables"))
        .mount(&server)
        .await;

    let err = client(&server).unregister("locked").await.unwrap_err();
    match err {
        ExtensionError::Registry { status, body, .. } => {
            assert_eq!(status, 409);
            assert_eq!(body, "extension has active runnables");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_already_registered_sends_no_post() {
    let server = MockServer::start().await;
    mount_lookup(&server, "minio", 200).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let repo = ExtensionRepo::new().with_extension("minio", MINIO);
    let cluster = Arc::new(MockCluster::new());
    let manager = manager_with(registry_config(&server), &cluster, &Arc::new(MockTools::new()));

    let mut extension = manager.load("minio", &repo.root()).await.unwrap();
    assert!(!manager.register(&mut extension).await.unwrap());
    // credentials are only transformed for a registration that is sent
    assert!(cluster.calls().is_empty());
    assert!(extension.transformed_credentials.is_empty());
}

#[tokio::test]
async fn test_register_posts_merged_credentials() {
    let server = MockServer::start().await;
    mount_lookup(&server, "minio", 404).await;
    Mock::given(method("POST"))
        .and(path("/extensions"))
        .and(body_partial_json(json!({
            "id": "minio",
            "product": "minio",
            "services": [{
                "id": "s3",
                "auth_required": true,
                "credentials": [{
                    "id": "default-s3-account",
                    "configuration": {
                        "AWS_ACCESS_KEY_ID": "admin",
                        "AWS_DEFAULT_REGION": "us-east-1"
                    }
                }]
            }]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut transformed = TransformedCredentials::new();
    transformed
        .entry("s3".into())
        .or_default()
        .entry("default-s3-account".into())
        .or_default()
        .insert("AWS_ACCESS_KEY_ID".into(), "admin".into());

    let descriptor = parse_descriptor(MINIO, "test").unwrap();
    client(&server)
        .create(&registration_payload("minio", &descriptor, &transformed))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_rejection_carries_body() {
    let server = MockServer::start().await;
    mount_lookup(&server, "minio", 404).await;
    Mock::given(method("POST"))
        .and(path("/extensions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("service s3 lacks endpoints"))
        .mount(&server)
        .await;

    let descriptor = parse_descriptor(MINIO, "test").unwrap();
    let payload = registration_payload("minio", &descriptor, &TransformedCredentials::new());
    let err = client(&server).create(&payload).await.unwrap_err();
    assert!(err.to_string().contains("service s3 lacks endpoints"));
}

#[tokio::test]
async fn test_ids_are_sent_as_one_escaped_segment() {
    let server = MockServer::start().await;
    mount_lookup(&server, "team%2Fminio%3Fv%3D2", 200).await;
    Mock::given(method("DELETE"))
        .and(path("/extensions/team%2Fminio%3Fv%3D2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.is_registered("team/minio?v=2").await.unwrap());
    client.unregister("team/minio?v=2").await.unwrap();
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extensions/minio"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_lookup(&server, "minio", 200).await;

    assert!(client(&server).is_registered("minio").await.unwrap());
}

#[tokio::test]
async fn test_list_registered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extensions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "mlflow",
                "product": "mlflow",
                "version": "1.19.0",
                "status": { "registered": "2021-08-01T10:00:00Z", "updated": "2021-08-01T10:00:00Z" },
                "services": [{ "id": "mlflow-tracking", "auth_required": false, "endpoints": [], "credentials": [] }]
            },
            { "id": "minio", "services": [] }
        ])))
        .mount(&server)
        .await;

    let extensions: Vec<RegisteredExtension> = client(&server).list_registered().await.unwrap();
    assert_eq!(extensions.len(), 2);
    assert_eq!(extensions[0].version.as_deref(), Some("1.19.0"));
    assert_eq!(extensions[0].services[0].id, "mlflow-tracking");
    assert_eq!(extensions[1].product, None);
}

#[tokio::test]
async fn test_list_failure_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extensions"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server).list_registered().await.unwrap_err();
    assert!(matches!(err, ExtensionError::Registry { status: 403, .. }));
}

#[tokio::test]
async fn test_manager_registers_transformed_credentials() {
    let server = MockServer::start().await;
    mount_lookup(&server, "minio", 404).await;
    Mock::given(method("POST"))
        .and(path("/extensions"))
        .and(body_partial_json(json!({
            "services": [{
                "credentials": [{
                    "configuration": {
                        "AWS_ACCESS_KEY_ID": "admin",
                        "AWS_SECRET_ACCESS_KEY": "s3cr3t"
                    }
                }]
            }]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let repo = ExtensionRepo::new().with_extension("minio", MINIO);
    let cluster = Arc::new(MockCluster::new().with_secret(
        "minio",
        "minio",
        &[("accesskey", "admin"), ("secretkey", "s3cr3t")],
    ));
    let tools = Arc::new(MockTools::new());
    let manager = manager_with(registry_config(&server), &cluster, &tools);

    let mut extension = manager.load("minio", &repo.root()).await.unwrap();
    assert!(manager.register(&mut extension).await.unwrap());

    assert_eq!(
        extension.transformed_credentials["s3"]["default-s3-account"]["AWS_SECRET_ACCESS_KEY"],
        "s3cr3t"
    );
    // one secret backs both values and is read once
    let reads = cluster
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ClusterCall::GetSecret(..)))
        .count();
    assert_eq!(reads, 1);
}

#[tokio::test]
async fn test_missing_secret_registers_nothing() {
    let server = MockServer::start().await;
    mount_lookup(&server, "minio", 404).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let repo = ExtensionRepo::new().with_extension("minio", MINIO);
    let cluster = Arc::new(MockCluster::new());
    let tools = Arc::new(MockTools::new());
    let manager = manager_with(registry_config(&server), &cluster, &tools);

    let mut extension = manager.load("minio", &repo.root()).await.unwrap();
    let err = manager.register(&mut extension).await.unwrap_err();

    assert!(matches!(err, ExtensionError::Credentials { .. }));
    assert!(extension.transformed_credentials.is_empty());
}

#[tokio::test]
async fn test_missing_secret_field_registers_nothing() {
    let server = MockServer::start().await;
    mount_lookup(&server, "minio", 404).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let repo = ExtensionRepo::new().with_extension("minio", MINIO);
    let cluster =
        Arc::new(MockCluster::new().with_secret("minio", "minio", &[("accesskey", "admin")]));
    let tools = Arc::new(MockTools::new());
    let manager = manager_with(registry_config(&server), &cluster, &tools);

    let mut extension = manager.load("minio", &repo.root()).await.unwrap();
    let err = manager.register(&mut extension).await.unwrap_err();
    assert!(err.to_string().contains("has no field secretkey"));
}

#[tokio::test]
async fn test_registry_requires_domain_or_url() {
    let cluster = Arc::new(MockCluster::new());
    let tools = Arc::new(MockTools::new());
    let config = ManagerConfig {
        system_domain: None,
        ..test_config()
    };
    let manager = manager_with(config, &cluster, &tools);

    let err = manager.list_registered().await.unwrap_err();
    assert!(matches!(err, ExtensionError::MissingSetting(_)));
}
