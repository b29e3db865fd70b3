//! `kubectl`-backed implementation of [`ClusterOps`]
//!
//! Every operation is one or a few `kubectl` invocations against the
//! current context. Ownership is expressed by a namespace label whose
//! key/value come from [`OwnershipLabel`].

use crate::command::{args, run, CommandOutput};
use crate::error::{ClusterError, Result};
use crate::traits::{ClusterOps, GatewayRequest};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use berth_core::types::{OwnershipLabel, RoleRule, Selector, WaitCondition};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// CRD whose presence means Istio gateways can be created
pub const GATEWAY_CRD: &str = "gateways.networking.istio.io";

const NOT_FOUND: &str = "NotFound";
const ALREADY_EXISTS: &str = "AlreadyExists";

/// Extra time granted to `kubectl wait` beyond its own `--timeout`
const WAIT_GRACE: Duration = Duration::from_secs(30);

pub struct KubectlCluster {
    binary_path: Option<String>,
    label: OwnershipLabel,
    poll_interval: Duration,
}

impl KubectlCluster {
    pub fn new(label: OwnershipLabel) -> Self {
        Self {
            binary_path: None,
            label,
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Use a specific kubectl binary instead of the one on `PATH`
    pub fn with_binary_path(mut self, path: impl Into<String>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    /// Interval between polls while waiting for pods to appear
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn kubectl_cmd(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("kubectl")
    }

    async fn kubectl(&self, arguments: Vec<String>) -> Result<CommandOutput> {
        run(self.kubectl_cmd(), &arguments, None, None).await
    }

    async fn kubectl_stdin(&self, arguments: Vec<String>, input: &str) -> Result<CommandOutput> {
        run(self.kubectl_cmd(), &arguments, None, Some(input)).await
    }

    /// `Ok(None)` when the object does not exist
    async fn get_json(&self, arguments: Vec<String>) -> Result<Option<Value>> {
        let out = self.kubectl(arguments).await?;
        if !out.success && out.output_contains(NOT_FOUND) {
            return Ok(None);
        }
        let out = out.check()?;
        serde_json::from_str(&out.stdout)
            .map(Some)
            .map_err(|e| ClusterError::decode(out.command, e))
    }
}

#[derive(Debug, Deserialize)]
struct SecretObject {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[async_trait]
impl ClusterOps for KubectlCluster {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let out = self
            .kubectl(args(["get", "namespace", namespace, "-o", "name"]))
            .await?;
        if out.success {
            return Ok(true);
        }
        if out.output_contains(NOT_FOUND) {
            return Ok(false);
        }
        out.check().map(|_| false)
    }

    async fn namespace_owned(&self, namespace: &str) -> Result<bool> {
        let Some(ns) = self
            .get_json(args(["get", "namespace", namespace, "-o", "json"]))
            .await?
        else {
            return Ok(false);
        };
        let label = ns
            .pointer("/metadata/labels")
            .and_then(|labels| labels.get(&self.label.key))
            .and_then(Value::as_str);
        Ok(label == Some(self.label.value.as_str()))
    }

    async fn label_namespace(&self, namespace: &str) -> Result<()> {
        self.kubectl(args([
            "label",
            "namespace",
            namespace,
            self.label.selector().as_str(),
            "--overwrite",
        ]))
        .await?
        .check()?;
        Ok(())
    }

    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        let out = self.kubectl(args(["create", "namespace", namespace])).await?;
        if !out.success && out.output_contains(ALREADY_EXISTS) {
            debug!("Namespace {} appeared concurrently", namespace);
            return Ok(());
        }
        out.check()?;
        info!("Created namespace {}", namespace);
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.kubectl(args([
            "delete",
            "namespace",
            namespace,
            "--ignore-not-found",
        ]))
        .await?
        .check()?;
        info!("Deleted namespace {}", namespace);
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, String>> {
        let out = self
            .kubectl(args(["get", "secret", name, "-n", namespace, "-o", "json"]))
            .await?
            .check()?;
        let secret: SecretObject = serde_json::from_str(&out.stdout)
            .map_err(|e| ClusterError::decode(format!("secret {}/{}", namespace, name), e))?;

        secret
            .data
            .into_iter()
            .map(|(key, encoded)| -> Result<(String, String)> {
                let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                    ClusterError::decode(format!("secret {}/{} field {}", namespace, name, key), e)
                })?;
                Ok((key, String::from_utf8_lossy(&bytes).into_owned()))
            })
            .collect()
    }

    async fn wait_pod_exists(
        &self,
        namespace: Option<&str>,
        selector: &str,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut arguments = args(["get", "pods", "--selector", selector, "-o", "name"]);
        if let Some(ns) = namespace {
            arguments.extend(args(["-n", ns]));
        }

        loop {
            let out = self.kubectl(arguments.clone()).await?;
            if out.success && !out.stdout.trim().is_empty() {
                return Ok(());
            }
            if Instant::now() + self.poll_interval > deadline {
                return Err(ClusterError::Timeout {
                    what: format!("pods matching {}", selector),
                    timeout,
                    output: out.combined(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_for_condition(&self, wait: &WaitCondition) -> Result<String> {
        let arguments = wait_args(wait);
        let what = format!("{} condition {}", wait.kind, wait.condition);

        let out = match tokio::time::timeout(wait.timeout + WAIT_GRACE, self.kubectl(arguments))
            .await
        {
            Ok(out) => out?,
            Err(_) => {
                return Err(ClusterError::Timeout {
                    what,
                    timeout: wait.timeout,
                    output: String::new(),
                })
            }
        };

        if out.success {
            return Ok(out.combined());
        }
        if out.output_contains("timed out") {
            return Err(ClusterError::Timeout {
                what,
                timeout: wait.timeout,
                output: out.combined(),
            });
        }
        out.check().map(|out| out.combined())
    }

    async fn has_gateway_support(&self) -> Result<bool> {
        let out = self
            .kubectl(args(["get", "crd", GATEWAY_CRD, "-o", "name"]))
            .await?;
        if out.success {
            return Ok(true);
        }
        if out.output_contains(NOT_FOUND) {
            return Ok(false);
        }
        out.check().map(|_| false)
    }

    async fn create_gateway(&self, gateway: &GatewayRequest) -> Result<()> {
        let manifest = gateway_manifest(gateway).to_string();
        self.kubectl_stdin(args(["apply", "-f", "-"]), &manifest)
            .await?
            .check()?;
        info!("Gateway {} routes {}", gateway.name, gateway.host);
        Ok(())
    }

    async fn grant_role_rule(&self, namespace: &str, role: &str, rule: &RoleRule) -> Result<()> {
        let mut object = self
            .get_json(args(["get", "role", role, "-n", namespace, "-o", "json"]))
            .await?
            .ok_or_else(|| ClusterError::CommandFailed {
                command: format!("kubectl get role {} -n {}", role, namespace),
                output: format!("role {} not found in namespace {}", role, namespace),
            })?;

        if !append_rule(&mut object, rule) {
            debug!("Role {} already grants {:?}", role, rule.resources);
            return Ok(());
        }

        self.kubectl_stdin(args(["replace", "-f", "-"]), &object.to_string())
            .await?
            .check()?;
        info!("Granted {:?} on {:?} to role {}", rule.verbs, rule.resources, role);
        Ok(())
    }
}

/// Arguments for `kubectl wait`
pub(crate) fn wait_args(wait: &WaitCondition) -> Vec<String> {
    let mut arguments = vec![
        "wait".to_string(),
        format!("--for=condition={}", wait.condition),
    ];
    match &wait.selector {
        Selector::All => arguments.push("--all".to_string()),
        Selector::Label(label) => arguments.push(format!("--selector={}", label)),
    }
    arguments.push(format!("--timeout={}s", wait.timeout.as_secs()));
    if let Some(ns) = &wait.namespace {
        arguments.extend(args(["-n", ns.as_str()]));
    }
    arguments.push(wait.kind.clone());
    arguments
}

fn rule_json(rule: &RoleRule) -> Value {
    json!({
        "apiGroups": rule.api_groups,
        "resources": rule.resources,
        "verbs": rule.verbs,
    })
}

/// Append `rule` to the role object's rules; false if already present
pub(crate) fn append_rule(role: &mut Value, rule: &RoleRule) -> bool {
    let wanted = rule_json(rule);
    let Some(object) = role.as_object_mut() else {
        return false;
    };
    let rules = object.entry("rules").or_insert_with(|| json!([]));
    match rules.as_array_mut() {
        Some(list) if list.contains(&wanted) => false,
        Some(list) => {
            list.push(wanted);
            true
        }
        None => {
            *rules = json!([wanted]);
            true
        }
    }
}

/// Istio Gateway plus, when a service host is set, a VirtualService
pub(crate) fn gateway_manifest(gateway: &GatewayRequest) -> Value {
    let gateway_name = format!("{}-gateway", gateway.name);
    let mut items = vec![json!({
        "apiVersion": "networking.istio.io/v1beta1",
        "kind": "Gateway",
        "metadata": { "name": gateway_name, "namespace": gateway.namespace },
        "spec": {
            "selector": { "istio": "ingressgateway" },
            "servers": [{
                "port": { "number": 80, "name": "http", "protocol": "HTTP" },
                "hosts": [gateway.host],
            }],
        },
    })];

    if let Some(service_host) = &gateway.service_host {
        items.push(json!({
            "apiVersion": "networking.istio.io/v1beta1",
            "kind": "VirtualService",
            "metadata": { "name": gateway.name, "namespace": gateway.namespace },
            "spec": {
                "hosts": [gateway.host],
                "gateways": [gateway_name],
                "http": [{
                    "route": [{
                        "destination": {
                            "host": service_host,
                            "port": { "number": gateway.port },
                        },
                    }],
                }],
            },
        }));
    }

    json!({ "apiVersion": "v1", "kind": "List", "items": items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn rule() -> RoleRule {
        RoleRule {
            api_groups: vec!["machinelearning.seldon.io".into()],
            resources: vec!["seldondeployments".into()],
            verbs: vec!["get".into(), "create".into()],
        }
    }

    #[test_case("pod", Some("demo"), "Ready", Selector::All, 120,
        "wait --for=condition=Ready --all --timeout=120s -n demo pod" ; "all in namespace")]
    #[test_case("deployment", None, "Available", Selector::Label("app=api".into()), 5,
        "wait --for=condition=Available --selector=app=api --timeout=5s deployment" ; "selector without namespace")]
    fn test_wait_args(
        kind: &str,
        namespace: Option<&str>,
        condition: &str,
        selector: Selector,
        timeout_secs: u64,
        expected: &str,
    ) {
        let wait = WaitCondition {
            kind: kind.into(),
            namespace: namespace.map(String::from),
            condition: condition.into(),
            selector,
            timeout: Duration::from_secs(timeout_secs),
        };
        assert_eq!(wait_args(&wait).join(" "), expected);
    }

    #[test]
    fn test_append_rule_once() {
        let mut role = json!({ "kind": "Role", "metadata": { "name": "berth-workloads" } });

        assert!(append_rule(&mut role, &rule()));
        assert!(!append_rule(&mut role, &rule()));
        assert_eq!(role["rules"].as_array().map(Vec::len), Some(1));
        assert_eq!(role["rules"][0]["apiGroups"][0], "machinelearning.seldon.io");
    }

    #[test]
    fn test_gateway_manifest_with_service() {
        let manifest = gateway_manifest(&GatewayRequest {
            name: "mlflow".into(),
            namespace: "mlflow".into(),
            host: "mlflow.10.0.0.1.nip.io".into(),
            service_host: Some("mlflow".into()),
            port: 80,
        });

        let items = manifest["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["kind"], "Gateway");
        assert_eq!(items[0]["spec"]["servers"][0]["hosts"][0], "mlflow.10.0.0.1.nip.io");
        assert_eq!(items[1]["spec"]["gateways"][0], "mlflow-gateway");
        assert_eq!(
            items[1]["spec"]["http"][0]["route"][0]["destination"]["host"],
            "mlflow"
        );
    }

    #[test_case(None, 1 ; "gateway only")]
    #[test_case(Some("mlflow"), 2 ; "gateway and route")]
    fn test_gateway_manifest_item_count(service_host: Option<&str>, items: usize) {
        let manifest = gateway_manifest(&GatewayRequest {
            name: "demo".into(),
            namespace: "demo".into(),
            host: "*.demo.example.com".into(),
            service_host: service_host.map(String::from),
            port: 80,
        });
        assert_eq!(manifest["items"].as_array().map(Vec::len), Some(items));
    }
}
