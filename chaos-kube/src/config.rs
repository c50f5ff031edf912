//! Cluster connection settings.
//!
//! Resolution order:
//! 1. an explicit API server (flag or `KUBE_API_SERVER`, token from flag or
//!    `KUBE_TOKEN`),
//! 2. the in-cluster service account,
//! 3. the current context of a kubeconfig file (first entry of
//!    `KUBECONFIG`, else `~/.kube/config`),
//! 4. a local `kubectl proxy`.

use crate::error::KubeError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Where Kubernetes mounts the pod's service account.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Default `kubectl proxy` address.
pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8001";

/// Kubernetes API connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfig {
    /// API server base URL, without a trailing slash.
    pub api_server: String,
    /// Bearer token, if the server needs one.
    pub token: Option<String>,
    /// PEM bundle to trust in addition to the system roots.
    pub ca_cert: Option<Vec<u8>>,
    /// PEM client certificate followed by its private key.
    pub identity: Option<Vec<u8>>,
}

impl KubeConfig {
    /// Talk to a local `kubectl proxy`, which handles authentication.
    pub fn proxy() -> Self {
        Self::explicit(DEFAULT_PROXY_URL, None)
    }

    /// Talk to `api_server` directly.
    pub fn explicit(api_server: &str, token: Option<String>) -> Self {
        Self {
            api_server: api_server.trim_end_matches('/').to_string(),
            token,
            ca_cert: None,
            identity: None,
        }
    }

    /// Settings from the pod's service account, or `None` outside a cluster.
    pub fn in_cluster() -> Result<Option<Self>, KubeError> {
        Self::in_cluster_from(
            Path::new(SERVICE_ACCOUNT_DIR),
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
        )
    }

    /// Settings from a service account directory and service address.
    pub fn in_cluster_from(
        dir: &Path,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<Option<Self>, KubeError> {
        let host = match host {
            Some(host) if !host.is_empty() => host,
            _ => return Ok(None),
        };
        let token_path = dir.join("token");
        if !token_path.exists() {
            return Ok(None);
        }

        let token = fs::read_to_string(&token_path)
            .map_err(|e| KubeError::Config(format!("reading {}: {e}", token_path.display())))?;

        let ca_path = dir.join("ca.crt");
        let ca_cert = if ca_path.exists() {
            Some(
                fs::read(&ca_path)
                    .map_err(|e| KubeError::Config(format!("reading {}: {e}", ca_path.display())))?,
            )
        } else {
            None
        };

        // IPv6 service hosts need brackets in a URL.
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };
        let port = port.unwrap_or_else(|| "443".into());

        Ok(Some(Self {
            api_server: format!("https://{host}:{port}"),
            token: Some(token.trim().to_string()),
            ca_cert,
            identity: None,
        }))
    }

    /// Settings from the default kubeconfig file, or `None` if there is none.
    pub fn kubeconfig() -> Result<Option<Self>, KubeError> {
        match kubeconfig_path() {
            Some(path) => Self::from_kubeconfig(&path),
            None => Ok(None),
        }
    }

    /// Settings for the current context of a kubeconfig file.
    ///
    /// A missing or empty file, or one without a current context, yields
    /// `None`. Relative file references resolve against the file's directory.
    pub fn from_kubeconfig(path: &Path) -> Result<Option<Self>, KubeError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| KubeError::Config(format!("reading {}: {e}", path.display())))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let file: KubeconfigFile = serde_yaml::from_str(&contents)
            .map_err(|e| KubeError::Config(format!("parsing {}: {e}", path.display())))?;

        let Some(current) = file.current_context.as_deref().filter(|c| !c.is_empty()) else {
            tracing::debug!("{} has no current-context", path.display());
            return Ok(None);
        };
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let context = file
            .contexts
            .iter()
            .find(|c| c.name == current)
            .map(|c| &c.context)
            .ok_or_else(|| KubeError::Config(format!("context {current:?} not found")))?;
        let cluster = file
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
            .ok_or_else(|| {
                KubeError::Config(format!("cluster {:?} not found", context.cluster))
            })?;
        let user = match &context.user {
            Some(name) => Some(
                file.users
                    .iter()
                    .find(|u| &u.name == name)
                    .map(|u| &u.user)
                    .ok_or_else(|| KubeError::Config(format!("user {name:?} not found")))?,
            ),
            None => None,
        };

        let ca_cert = pem_source(
            base,
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
        )?;

        let mut config = Self::explicit(&cluster.server, None);
        config.ca_cert = ca_cert;
        if let Some(user) = user {
            config.token = match (&user.token, &user.token_file) {
                (Some(token), _) => Some(token.trim().to_string()),
                (None, Some(file)) => {
                    let path = base.join(file);
                    let token = fs::read_to_string(&path).map_err(|e| {
                        KubeError::Config(format!("reading {}: {e}", path.display()))
                    })?;
                    Some(token.trim().to_string())
                }
                (None, None) => None,
            };

            let cert = pem_source(
                base,
                user.client_certificate_data.as_deref(),
                user.client_certificate.as_deref(),
            )?;
            let key = pem_source(
                base,
                user.client_key_data.as_deref(),
                user.client_key.as_deref(),
            )?;
            config.identity = match (cert, key) {
                (Some(mut cert), Some(key)) => {
                    cert.push(b'\n');
                    cert.extend_from_slice(&key);
                    Some(cert)
                }
                (None, None) => None,
                _ => {
                    return Err(KubeError::Config(format!(
                        "user in context {current:?} needs both a client certificate and key"
                    )))
                }
            };
        }

        Ok(Some(config))
    }

    /// Resolve settings from flags, environment, service account, kubeconfig,
    /// or proxy.
    pub fn discover(
        api_server: Option<String>,
        token: Option<String>,
    ) -> Result<Self, KubeError> {
        let api_server = api_server.or_else(|| non_empty_env("KUBE_API_SERVER"));
        let token = token.or_else(|| non_empty_env("KUBE_TOKEN"));
        let in_cluster = match api_server {
            Some(_) => None,
            None => Self::in_cluster()?,
        };
        let kubeconfig = match (&api_server, &in_cluster) {
            (None, None) => Self::kubeconfig()?,
            _ => None,
        };
        Self::resolve(api_server, token, in_cluster, kubeconfig)
    }

    fn resolve(
        api_server: Option<String>,
        token: Option<String>,
        in_cluster: Option<Self>,
        kubeconfig: Option<Self>,
    ) -> Result<Self, KubeError> {
        if let Some(api_server) = api_server {
            tracing::info!("using kubernetes api at {}", api_server);
            return Ok(Self::explicit(&api_server, token));
        }

        if let Some(config) = in_cluster {
            tracing::info!("using in-cluster service account");
            return Ok(config);
        }

        if let Some(mut config) = kubeconfig {
            tracing::info!("using kubeconfig cluster at {}", config.api_server);
            if token.is_some() {
                config.token = token;
            }
            return Ok(config);
        }

        if token.is_some() {
            return Err(KubeError::Config(
                "a token was given without an api server".into(),
            ));
        }

        tracing::info!("using kubectl proxy at {}", DEFAULT_PROXY_URL);
        Ok(Self::proxy())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn kubeconfig_path() -> Option<PathBuf> {
    if let Some(paths) = std::env::var_os("KUBECONFIG") {
        if let Some(first) = std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
            return Some(first);
        }
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"))
}

/// PEM bytes from inline base64 data, or else from a file.
fn pem_source(
    base: &Path,
    data: Option<&str>,
    file: Option<&Path>,
) -> Result<Option<Vec<u8>>, KubeError> {
    if let Some(data) = data {
        let pem = STANDARD
            .decode(data.trim())
            .map_err(|e| KubeError::Config(format!("invalid base64 certificate data: {e}")))?;
        return Ok(Some(pem));
    }
    match file {
        Some(file) => {
            let path = base.join(file);
            fs::read(&path)
                .map(Some)
                .map_err(|e| KubeError::Config(format!("reading {}: {e}", path.display())))
        }
        None => Ok(None),
    }
}

// The subset of the kubeconfig format needed to reach one cluster.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeconfigFile {
    current_context: Option<String>,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority: Option<PathBuf>,
    certificate_authority_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UserEntry {
    token: Option<String>,
    token_file: Option<PathBuf>,
    client_certificate: Option<PathBuf>,
    client_certificate_data: Option<String>,
    client_key: Option<PathBuf>,
    client_key_data: Option<String>,
}
