//! HTTP client for the console gateway.
//!
//! The gateway speaks two response dialects. Cluster-level endpoints
//! (`/k8s-clusters`, `/pods`, ...) return their payload at the top level and
//! signal failure with an `error` field. Agent-proxy endpoints
//! (`/list-files`, `/exec-command`, ...) wrap everything in an envelope of
//! `{"status": "success" | "failed" | "error", ...}` because the gateway is
//! relaying to a per-node agent that can fail independently. The helpers
//! [`reject_error`] and [`unwrap_envelope`] normalize both dialects into
//! [`GatewayError`].

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Clusters known to the gateway and which one is active.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterList {
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub active: Option<String>,
}

/// One row of `kubectl get nodes -o wide`, as the gateway forwards it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeRow {
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "STATUS", default)]
    pub status: String,
    #[serde(rename = "ROLES", default)]
    pub roles: String,
    #[serde(rename = "VERSION", default)]
    pub version: String,
    #[serde(rename = "INTERNAL-IP", default)]
    pub internal_ip: String,
    #[serde(rename = "EXTERNAL-IP", default)]
    pub external_ip: String,
    #[serde(rename = "OS-IMAGE", default)]
    pub os_image: String,
    #[serde(rename = "KERNEL-VERSION", default)]
    pub kernel_version: String,
    #[serde(rename = "CONTAINER-RUNTIME", default)]
    pub container_runtime: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PodRow {
    #[serde(rename = "NAMESPACE", default)]
    pub namespace: String,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "READY", default)]
    pub ready: String,
    #[serde(rename = "STATUS", default)]
    pub status: String,
    #[serde(rename = "RESTARTS", default)]
    pub restarts: i64,
    #[serde(rename = "AGE", default)]
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeploymentRow {
    #[serde(rename = "NAMESPACE", default)]
    pub namespace: String,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "READY", default)]
    pub ready: String,
    #[serde(rename = "UP-TO-DATE", default)]
    pub up_to_date: i64,
    #[serde(rename = "AVAILABLE", default)]
    pub available: i64,
    #[serde(rename = "AGE", default)]
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceRow {
    #[serde(rename = "NAMESPACE", default)]
    pub namespace: String,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "TYPE", default)]
    pub kind: String,
    #[serde(rename = "CLUSTER-IP", default)]
    pub cluster_ip: String,
    #[serde(rename = "EXTERNAL-IP", default)]
    pub external_ip: String,
    #[serde(rename = "PORT(S)", default)]
    pub ports: String,
    #[serde(rename = "AGE", default)]
    pub age: String,
}

/// Log lines for one pod container.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PodLogs {
    pub pod: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub log_lines: Vec<String>,
    #[serde(default)]
    pub total_lines: u64,
}

/// CPU and memory utilization reported by a node agent, both 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub memory: f64,
}

/// Outcome of a reachability probe against a node agent.
///
/// An unreachable agent is a probe *result*, not a client error, so this is
/// returned on the `Ok` path.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProbe {
    pub reachable: bool,
    pub detail: String,
}

/// What `/list-files` produced for a given path.
///
/// The gateway disambiguates by content type: JSON means a directory
/// listing, `application/octet-stream` or `text/*` means the path named a
/// file and the body is its contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Entries(Vec<String>),
    File { name: String, bytes: Vec<u8> },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    http_status: Option<u16>,
}

/// Rejects top-level `{"error": ...}` responses from cluster endpoints.
fn reject_error(value: Value) -> Result<Value> {
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(GatewayError::Api(message.to_string()));
    }
    Ok(value)
}

/// Unwraps the agent-proxy envelope, turning non-success statuses into
/// [`GatewayError::Api`].
fn unwrap_envelope(value: Value) -> Result<Value> {
    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|err| GatewayError::Decode(format!("malformed gateway envelope: {err}")))?;
    if envelope.status == "success" {
        return Ok(envelope.data.unwrap_or(Value::Null));
    }
    let mut detail = envelope
        .error
        .unwrap_or_else(|| format!("gateway reported '{}'", envelope.status));
    if let Some(code) = envelope.http_status {
        detail = format!("{detail} (agent HTTP {code})");
    }
    Err(GatewayError::Api(detail))
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| GatewayError::Decode(format!("{what}: {err}")))
}

/// Client for one console gateway. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Builds a client from the loaded configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_base_url(
            config.gateway_url(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Builds a client against an explicit base URL, mainly for tests.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Connection(format!("building http client: {err}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Connection(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Connection(format!(
                "gateway returned HTTP {status}"
            )));
        }
        Ok(response)
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }

    /// `GET /k8s-clusters`: kube contexts the gateway can serve.
    pub async fn clusters(&self) -> Result<ClusterList> {
        let value = self
            .send_json(self.http.get(self.url("/k8s-clusters")))
            .await?;
        decode(reject_error(value)?, "cluster list")
    }

    /// `GET /cluster-nodes`: node table for the given (or active) cluster.
    pub async fn cluster_nodes(&self, cluster: Option<&str>) -> Result<Vec<NodeRow>> {
        let mut request = self.http.get(self.url("/cluster-nodes"));
        if let Some(cluster) = cluster {
            request = request.query(&[("cluster", cluster)]);
        }
        let value = self.send_json(request).await?;
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            nodes: Vec<NodeRow>,
        }
        let payload: Payload = decode(reject_error(value)?, "node list")?;
        Ok(payload.nodes)
    }

    /// `GET /pods`: all pods across namespaces.
    pub async fn pods(&self) -> Result<Vec<PodRow>> {
        let value = self.send_json(self.http.get(self.url("/pods"))).await?;
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            pods: Vec<PodRow>,
        }
        let payload: Payload = decode(reject_error(value)?, "pod list")?;
        Ok(payload.pods)
    }

    /// `GET /deployments`: all deployments across namespaces.
    pub async fn deployments(&self) -> Result<Vec<DeploymentRow>> {
        let value = self
            .send_json(self.http.get(self.url("/deployments")))
            .await?;
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            deployments: Vec<DeploymentRow>,
        }
        let payload: Payload = decode(reject_error(value)?, "deployment list")?;
        Ok(payload.deployments)
    }

    /// `GET /services`: all services across namespaces.
    pub async fn services(&self) -> Result<Vec<ServiceRow>> {
        let value = self
            .send_json(self.http.get(self.url("/services")))
            .await?;
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            services: Vec<ServiceRow>,
        }
        let payload: Payload = decode(reject_error(value)?, "service list")?;
        Ok(payload.services)
    }

    /// `GET /pod-logs`: tail of one pod container's logs.
    pub async fn pod_logs(
        &self,
        pod: &str,
        namespace: &str,
        container: Option<&str>,
        tail: u32,
    ) -> Result<PodLogs> {
        let tail = tail.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("pod_name", pod),
            ("namespace", namespace),
            ("tail_lines", tail.as_str()),
        ];
        if let Some(container) = container {
            query.push(("container", container));
        }
        let value = self
            .send_json(self.http.get(self.url("/pod-logs")).query(&query))
            .await?;
        decode(reject_error(value)?, "pod logs")
    }

    /// `GET /check-node-status`: probes whether a node agent answers.
    pub async fn check_node(&self, ip: &str, port: u16) -> Result<NodeProbe> {
        let port = port.to_string();
        let value = self
            .send_json(
                self.http
                    .get(self.url("/check-node-status"))
                    .query(&[("ip", ip), ("port", port.as_str())]),
            )
            .await?;
        #[derive(Deserialize)]
        struct Probe {
            status: String,
            #[serde(default)]
            http_status: Option<u16>,
            #[serde(default)]
            error: Option<String>,
        }
        let probe: Probe = decode(value, "node probe")?;
        match probe.status.as_str() {
            "reachable" => Ok(NodeProbe {
                reachable: true,
                detail: "agent responding".to_string(),
            }),
            "unreachable" => Ok(NodeProbe {
                reachable: false,
                detail: probe
                    .http_status
                    .map(|code| format!("agent returned HTTP {code}"))
                    .unwrap_or_else(|| "agent not responding".to_string()),
            }),
            "error" => Ok(NodeProbe {
                reachable: false,
                detail: probe.error.unwrap_or_else(|| "probe failed".to_string()),
            }),
            other => Err(GatewayError::Decode(format!(
                "unknown probe status '{other}'"
            ))),
        }
    }

    /// `GET /get-resource-usage`: CPU and memory utilization from an agent.
    pub async fn resource_usage(&self, ip: &str, port: u16) -> Result<ResourceUsage> {
        let port = port.to_string();
        let value = self
            .send_json(
                self.http
                    .get(self.url("/get-resource-usage"))
                    .query(&[("ip", ip), ("port", port.as_str())]),
            )
            .await?;
        decode(unwrap_envelope(value)?, "resource usage")
    }

    /// `GET /get-logs`: recent agent log output, newest last.
    pub async fn agent_logs(&self, ip: &str, port: u16, lines: u32) -> Result<String> {
        let port = port.to_string();
        let lines = lines.to_string();
        let value = self
            .send_json(self.http.get(self.url("/get-logs")).query(&[
                ("ip", ip),
                ("port", port.as_str()),
                ("lines", lines.as_str()),
            ]))
            .await?;
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            logs: String,
        }
        let payload: Payload = decode(unwrap_envelope(value)?, "agent logs")?;
        Ok(payload.logs)
    }

    /// `POST /exec-command`: runs a shell command on the node agent.
    pub async fn exec_command(&self, ip: &str, port: u16, cmd: &str) -> Result<()> {
        debug!(ip, port, cmd, "executing remote command");
        let body = serde_json::json!({ "ip": ip, "port": port, "cmd": cmd });
        let value = self
            .send_json(self.http.post(self.url("/exec-command")).json(&body))
            .await?;
        unwrap_envelope(value)?;
        Ok(())
    }

    /// `POST /interrupt-process`: interrupts whatever the agent is running.
    pub async fn interrupt_process(&self, ip: &str, port: u16) -> Result<()> {
        debug!(ip, port, "interrupting remote process");
        let body = serde_json::json!({ "ip": ip, "port": port });
        let value = self
            .send_json(self.http.post(self.url("/interrupt-process")).json(&body))
            .await?;
        unwrap_envelope(value)?;
        Ok(())
    }

    /// `POST /clear-workspace`: wipes the agent's workspace directory.
    pub async fn clear_workspace(&self, ip: &str, port: u16) -> Result<()> {
        debug!(ip, port, "clearing remote workspace");
        let body = serde_json::json!({ "ip": ip, "port": port });
        let value = self
            .send_json(self.http.post(self.url("/clear-workspace")).json(&body))
            .await?;
        unwrap_envelope(value)?;
        Ok(())
    }

    /// `GET /list-files`: directory listing or raw file bytes, depending on
    /// what the path names. See [`Listing`].
    pub async fn list_files(&self, ip: &str, port: u16, path: &str) -> Result<Listing> {
        debug!(ip, port, path, "listing remote path");
        let port = port.to_string();
        let request = self.http.get(self.url("/list-files")).query(&[
            ("ip", ip),
            ("port", port.as_str()),
            ("path", path),
        ]);
        let response = self.send(request).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.starts_with("application/octet-stream") || content_type.starts_with("text/")
        {
            let bytes = response
                .bytes()
                .await
                .map_err(|err| GatewayError::Connection(err.to_string()))?;
            let name = path
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .unwrap_or("download")
                .to_string();
            return Ok(Listing::File {
                name,
                bytes: bytes.to_vec(),
            });
        }
        let value: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            files: Vec<String>,
        }
        let payload: Payload = decode(unwrap_envelope(value)?, "file listing")?;
        Ok(Listing::Entries(payload.files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    async fn server_and_client() -> (ServerGuard, GatewayClient) {
        let server = Server::new_async().await;
        let client = GatewayClient::with_base_url(server.url(), Duration::from_secs(2)).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn list_files_decodes_json_listing() {
        let (mut server, client) = server_and_client().await;
        let mock = server
            .mock("GET", "/list-files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ip".into(), "10.0.0.5".into()),
                Matcher::UrlEncoded("port".into(), "30081".into()),
                Matcher::UrlEncoded("path".into(), "workspace".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","data":{"files":["run1","output.log"]}}"#)
            .create_async()
            .await;

        let listing = client.list_files("10.0.0.5", 30081, "workspace").await.unwrap();
        assert_eq!(
            listing,
            Listing::Entries(vec!["run1".to_string(), "output.log".to_string()])
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_files_passes_file_bytes_through() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/list-files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(&b"raw-bytes"[..])
            .create_async()
            .await;

        let listing = client
            .list_files("10.0.0.5", 30081, "workspace/output.log")
            .await
            .unwrap();
        match listing {
            Listing::File { name, bytes } => {
                assert_eq!(name, "output.log");
                assert_eq!(bytes, b"raw-bytes");
            }
            Listing::Entries(_) => panic!("expected file bytes"),
        }
    }

    #[tokio::test]
    async fn envelope_failure_becomes_api_error() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/list-files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"failed","http_status":502}"#)
            .create_async()
            .await;

        let err = client.list_files("10.0.0.5", 30081, "gone").await.unwrap_err();
        match err {
            GatewayError::Api(message) => assert!(message.contains("502")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn agent_logs_unwrap_nested_payload() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/get-logs")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ip".into(), "10.0.0.5".into()),
                Matcher::UrlEncoded("lines".into(), "50".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","data":{"logs":"line one\nline two"}}"#)
            .create_async()
            .await;

        let logs = client.agent_logs("10.0.0.5", 30081, 50).await.unwrap();
        assert_eq!(logs, "line one\nline two");
    }

    #[tokio::test]
    async fn exec_command_posts_json_body() {
        let (mut server, client) = server_and_client().await;
        let mock = server
            .mock("POST", "/exec-command")
            .match_body(Matcher::Json(serde_json::json!({
                "ip": "10.0.0.5",
                "port": 30081,
                "cmd": "nvidia-smi"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","data":{"output":"ok"}}"#)
            .create_async()
            .await;

        client.exec_command("10.0.0.5", 30081, "nvidia-smi").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn pods_decode_column_style_keys() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/pods")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"pods":[{"NAMESPACE":"volcano-system","NAME":"vc-scheduler-0","READY":"1/1","STATUS":"Running","RESTARTS":2,"AGE":"2025-05-01 10:00:00"}]}"#,
            )
            .create_async()
            .await;

        let pods = client.pods().await.unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].namespace, "volcano-system");
        assert_eq!(pods[0].name, "vc-scheduler-0");
        assert_eq!(pods[0].restarts, 2);
    }

    #[tokio::test]
    async fn cluster_nodes_error_field_surfaces() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/cluster-nodes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"cluster 'prod' not found"}"#)
            .create_async()
            .await;

        let err = client.cluster_nodes(Some("prod")).await.unwrap_err();
        match err {
            GatewayError::Api(message) => assert!(message.contains("prod")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resource_usage_reads_percentages() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/get-resource-usage")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","data":{"cpu":12.5,"memory":55.0}}"#)
            .create_async()
            .await;

        let usage = client.resource_usage("10.0.0.5", 30081).await.unwrap();
        assert_eq!(usage.cpu, 12.5);
        assert_eq!(usage.memory, 55.0);
    }

    #[tokio::test]
    async fn probe_maps_unreachable_status() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/check-node-status")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"unreachable","http_status":503}"#)
            .create_async()
            .await;

        let probe = client.check_node("10.0.0.5", 30081).await.unwrap();
        assert!(!probe.reachable);
        assert!(probe.detail.contains("503"));
    }

    #[tokio::test]
    async fn non_success_http_is_connection_error() {
        let (mut server, client) = server_and_client().await;
        server
            .mock("GET", "/pods")
            .with_status(500)
            .create_async()
            .await;

        let err = client.pods().await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
    }

    #[tokio::test]
    async fn pod_logs_sends_backend_parameter_names() {
        let (mut server, client) = server_and_client().await;
        let mock = server
            .mock("GET", "/pod-logs")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("pod_name".into(), "trainer-0".into()),
                Matcher::UrlEncoded("namespace".into(), "default".into()),
                Matcher::UrlEncoded("tail_lines".into(), "100".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"pod":"trainer-0","namespace":"default","container":"main","log_lines":["epoch 1","epoch 2"],"total_lines":2}"#,
            )
            .create_async()
            .await;

        let logs = client.pod_logs("trainer-0", "default", None, 100).await.unwrap();
        assert_eq!(logs.pod, "trainer-0");
        assert_eq!(logs.log_lines.len(), 2);
        assert_eq!(logs.container.as_deref(), Some("main"));
        mock.assert_async().await;
    }
}
