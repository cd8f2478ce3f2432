use std::time::Duration;

use async_trait::async_trait;
use hyos_types::{LogFetchResponse, LogQuery};

/// Path of the log endpoint relative to the manager's base URL
pub const LOGS_PATH: &str = "/api/server/logs";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from fetching a log window
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid base URL '{0}'")]
    InvalidUrl(String),
}

/// Source of log windows for a polling client
#[async_trait]
pub trait LogsApi: Send + Sync {
    async fn fetch(&self, query: &LogQuery) -> Result<LogFetchResponse, FetchError>;
}

/// Log endpoint client over HTTP
///
/// Built once with the manager's base URL and shared by every view.
#[derive(Clone)]
pub struct HttpLogsApi {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpLogsApi {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base = base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{base}{LOGS_PATH}"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LogsApi for HttpLogsApi {
    async fn fetch(&self, query: &LogQuery) -> Result<LogFetchResponse, FetchError> {
        let resp = self.http.get(&self.endpoint).query(query).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}
