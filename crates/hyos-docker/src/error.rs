//! Error types for container runtime calls.

use hyper::StatusCode;

/// Errors produced while talking to the container runtime.
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("cannot reach docker at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no such container: {0}")]
    NotFound(String),

    #[error("invalid container name: {0:?}")]
    InvalidContainer(String),

    #[error("docker returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("unsupported docker host: {0}")]
    UnsupportedHost(String),
}
