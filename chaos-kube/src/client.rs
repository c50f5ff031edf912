//! Kubernetes API client.
//!
//! Only the handful of calls db-chaos needs: list pods in a namespace, and
//! create / delete Chaos Mesh resources.

use crate::config::KubeConfig;
use crate::error::KubeError;
use async_trait::async_trait;
use chaos_core::{ExperimentHandle, Orchestrator, OrchestratorError};
use chaos_types::{ExperimentDescriptor, API_VERSION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of `GET /api/v1/namespaces/{ns}/pods`.
#[derive(Debug, Clone, Deserialize)]
pub struct PodList {
    /// Pods in the namespace.
    #[serde(default)]
    pub items: Vec<Pod>,
}

/// The parts of a pod db-chaos reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Pod {
    /// Object metadata.
    pub metadata: PodMetadata,
}

/// Pod metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct PodMetadata {
    /// Pod name.
    pub name: String,
}

impl PodList {
    /// Pod names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .items
            .iter()
            .map(|pod| pod.metadata.name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Client for the Kubernetes API.
pub struct KubeClient {
    config: KubeConfig,
    http: reqwest::Client,
}

impl KubeClient {
    /// Create a new client.
    pub fn new(config: KubeConfig) -> Result<Self, KubeError> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);

        if let Some(pem) = &config.ca_cert {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| KubeError::Config(format!("invalid ca certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(pem) = &config.identity {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| KubeError::Config(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|e| KubeError::Config(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.api_server
    }

    /// Build the URL for a namespace's pods.
    pub fn pods_url(&self, namespace: &str) -> String {
        format!("{}/api/v1/namespaces/{}/pods", self.base_url(), namespace)
    }

    /// Build the URL for a Chaos Mesh resource collection.
    pub fn experiments_url(&self, namespace: &str, plural: &str) -> String {
        format!(
            "{}/apis/{}/namespaces/{}/{}",
            self.base_url(),
            API_VERSION,
            namespace,
            plural
        )
    }

    /// Build the URL for a specific Chaos Mesh resource.
    pub fn experiment_url(&self, namespace: &str, plural: &str, name: &str) -> String {
        format!("{}/{}", self.experiments_url(namespace, plural), name)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// List pods in a namespace.
    pub async fn list_pods(&self, namespace: &str) -> Result<PodList, KubeError> {
        let url = self.pods_url(namespace);
        let response = self.request(Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Create the resource described by `descriptor`.
    pub async fn create(&self, descriptor: &ExperimentDescriptor) -> Result<(), KubeError> {
        let url =
            self.experiments_url(descriptor.namespace(), descriptor.experiment.resource_plural());
        let response = self
            .request(Method::POST, &url)
            .json(descriptor)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(KubeError::AlreadyExists(descriptor.name().to_string()));
        }

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }

    /// Delete a resource. A resource that is already gone is not an error.
    pub async fn delete(
        &self,
        namespace: &str,
        plural: &str,
        name: &str,
    ) -> Result<(), KubeError> {
        let url = self.experiment_url(namespace, plural, name);
        let response = self.request(Method::DELETE, &url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("{}/{} already deleted", namespace, name);
            return Ok(());
        }

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }
}

async fn api_error(response: reqwest::Response) -> KubeError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    KubeError::Api { status, body }
}

/// Connection failures keep their own variant; anything else becomes a reason.
fn failure_reason(e: KubeError) -> Result<String, OrchestratorError> {
    match e {
        KubeError::Connection(reason) => Err(OrchestratorError::Connection(reason)),
        other => Ok(other.to_string()),
    }
}

#[async_trait]
impl Orchestrator for KubeClient {
    async fn list_service_instances(
        &self,
        namespace: &str,
    ) -> Result<Vec<String>, OrchestratorError> {
        match self.list_pods(namespace).await {
            Ok(pods) => Ok(pods.names()),
            Err(e) => Err(OrchestratorError::Discovery {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn submit(
        &self,
        descriptor: &ExperimentDescriptor,
    ) -> Result<ExperimentHandle, OrchestratorError> {
        match self.create(descriptor).await {
            Ok(()) => Ok(ExperimentHandle::for_descriptor(descriptor)),
            Err(KubeError::AlreadyExists(name)) => Err(OrchestratorError::AlreadyExists(name)),
            Err(e) => Err(OrchestratorError::Submit {
                name: descriptor.name().to_string(),
                reason: failure_reason(e)?,
            }),
        }
    }

    async fn withdraw(&self, handle: &ExperimentHandle) -> Result<(), OrchestratorError> {
        match self
            .delete(&handle.namespace, &handle.resource_plural, &handle.name)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(OrchestratorError::Withdraw {
                name: handle.name.clone(),
                reason: failure_reason(e)?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_types::builder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn client() -> KubeClient {
        KubeClient::new(KubeConfig::proxy()).unwrap()
    }

    /// Answer one request with `status` and `body`; yields the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (KubeClient, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        let client = KubeClient::new(KubeConfig::explicit(&url, Some("t0ken".into()))).unwrap();
        (client, task)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= end + 4 + length
    }

    #[test]
    fn client_urls() {
        let client = client();

        assert_eq!(
            client.pods_url("crdb"),
            "http://127.0.0.1:8001/api/v1/namespaces/crdb/pods"
        );
        assert_eq!(
            client.experiments_url("chaos-mesh", "podchaos"),
            "http://127.0.0.1:8001/apis/chaos-mesh.org/v1alpha1/namespaces/chaos-mesh/podchaos"
        );
        assert_eq!(
            client.experiment_url("chaos-mesh", "networkchaos", "db-0-db-1-partition-to"),
            "http://127.0.0.1:8001/apis/chaos-mesh.org/v1alpha1/namespaces/chaos-mesh/networkchaos/db-0-db-1-partition-to"
        );
    }

    #[test]
    fn pod_list_names_sorted() {
        let json = r#"{
            "kind": "PodList",
            "apiVersion": "v1",
            "items": [
                {"metadata": {"name": "crdb-2", "namespace": "crdb"}, "status": {"phase": "Running"}},
                {"metadata": {"name": "crdb-0", "namespace": "crdb"}},
                {"metadata": {"name": "crdb-1", "namespace": "crdb"}}
            ]
        }"#;
        let pods: PodList = serde_json::from_str(json).unwrap();
        assert_eq!(pods.names(), vec!["crdb-0", "crdb-1", "crdb-2"]);
    }

    #[test]
    fn empty_pod_list() {
        let pods: PodList = serde_json::from_str(r#"{"kind": "PodList"}"#).unwrap();
        assert!(pods.names().is_empty());
    }

    #[test]
    fn invalid_ca_rejected() {
        let mut config = KubeConfig::proxy();
        config.ca_cert = Some(b"not a certificate".to_vec());
        assert!(matches!(KubeClient::new(config), Err(KubeError::Config(_))));
    }

    #[test]
    fn invalid_identity_rejected() {
        let mut config = KubeConfig::proxy();
        config.identity = Some(b"not a key".to_vec());
        assert!(matches!(KubeClient::new(config), Err(KubeError::Config(_))));
    }

    #[tokio::test]
    async fn lists_pods_with_bearer_token() {
        let (client, server) = serve_once(
            "200 OK",
            r#"{"items":[{"metadata":{"name":"pg-1"}},{"metadata":{"name":"pg-0"}}]}"#,
        )
        .await;

        let pods = client.list_service_instances("pg").await.unwrap();
        assert_eq!(pods, vec!["pg-0", "pg-1"]);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v1/namespaces/pg/pods"));
        assert!(request.to_lowercase().contains("authorization: bearer t0ken"));
    }

    #[tokio::test]
    async fn list_forbidden_is_discovery_error() {
        let (client, _server) = serve_once("403 Forbidden", r#"{"reason":"Forbidden"}"#).await;

        let err = client.list_service_instances("pg").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Discovery { namespace, .. } if namespace == "pg"));
    }

    #[tokio::test]
    async fn submit_posts_descriptor() {
        let (client, server) = serve_once("201 Created", "{}").await;
        let descriptor = builder::pod_kill("pg-0", "pg", "chaos-mesh").unwrap();

        let handle = client.submit(&descriptor).await.unwrap();
        assert_eq!(handle.name, "pg-0-pod-kill");
        assert_eq!(handle.resource_plural, "podchaos");

        let request = server.await.unwrap();
        assert!(request
            .starts_with("POST /apis/chaos-mesh.org/v1alpha1/namespaces/chaos-mesh/podchaos"));
        assert!(request.contains(r#""kind":"PodChaos""#));
        assert!(request.contains(r#""action":"pod-kill""#));
    }

    #[tokio::test]
    async fn submit_conflict_is_already_exists() {
        let (client, _server) = serve_once("409 Conflict", r#"{"reason":"AlreadyExists"}"#).await;
        let descriptor = builder::pod_kill("pg-0", "pg", "chaos-mesh").unwrap();

        let err = client.submit(&descriptor).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyExists(name) if name == "pg-0-pod-kill"));
    }

    #[tokio::test]
    async fn withdraw_missing_is_ok() {
        let (client, server) = serve_once("404 Not Found", r#"{"reason":"NotFound"}"#).await;
        let descriptor = builder::pod_kill("pg-0", "pg", "chaos-mesh").unwrap();

        client
            .withdraw(&ExperimentHandle::for_descriptor(&descriptor))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with(
            "DELETE /apis/chaos-mesh.org/v1alpha1/namespaces/chaos-mesh/podchaos/pg-0-pod-kill"
        ));
    }

    #[tokio::test]
    async fn withdraw_server_error() {
        let (client, _server) = serve_once("500 Internal Server Error", "boom").await;
        let descriptor = builder::pod_kill("pg-0", "pg", "chaos-mesh").unwrap();

        let err = client
            .withdraw(&ExperimentHandle::for_descriptor(&descriptor))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Withdraw { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_error() {
        let client = KubeClient::new(KubeConfig::explicit("http://127.0.0.1:1", None)).unwrap();
        let descriptor = builder::pod_kill("pg-0", "pg", "chaos-mesh").unwrap();

        let err = client.submit(&descriptor).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Connection(_)));
    }
}
