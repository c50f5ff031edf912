//! Kubernetes client errors.

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API.
#[derive(Debug, Error)]
pub enum KubeError {
    /// The API server could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request or response failed at the HTTP layer.
    #[error("http error: {0}")]
    Http(String),

    /// The API answered with an error status.
    #[error("api error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A resource with this name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Credentials or cluster settings could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for KubeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            KubeError::Connection(e.to_string())
        } else {
            KubeError::Http(e.to_string())
        }
    }
}
