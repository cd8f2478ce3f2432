//! Docker Engine API client
//!
//! Speaks plain HTTP/1.1 to the daemon over its unix socket (or a TCP
//! endpoint) and hands back response bodies untouched, so the log stream
//! keeps its multiplexing headers.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{Request, StatusCode, header};
use hyper_util::rt::TokioIo;
use serde::Deserialize;

use crate::{ContainerRuntime, DockerError, LogsOptions, TtlCache};

/// Default daemon socket
const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// How long an inspect or ping answer is trusted
const CACHE_TTL: Duration = Duration::from_secs(30);

/// Engine API version prefix
const API_VERSION: &str = "v1.41";

/// Where the daemon listens
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DockerHost {
    Unix(PathBuf),
    Tcp(String),
}

impl DockerHost {
    /// Parse `unix:///path`, `tcp://host:port`, or a bare socket path
    pub fn parse(value: &str) -> Result<Self, DockerError> {
        if let Some(path) = value.strip_prefix("unix://") {
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = value
            .strip_prefix("tcp://")
            .or_else(|| value.strip_prefix("http://"))
        {
            let addr = addr.trim_end_matches('/');
            if addr.is_empty() {
                return Err(DockerError::UnsupportedHost(value.to_string()));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        if value.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(value)));
        }
        Err(DockerError::UnsupportedHost(value.to_string()))
    }

    fn endpoint(&self) -> String {
        match self {
            Self::Unix(path) => format!("unix://{}", path.display()),
            Self::Tcp(addr) => format!("tcp://{addr}"),
        }
    }
}

impl Default for DockerHost {
    fn default() -> Self {
        Self::Unix(PathBuf::from(DEFAULT_SOCKET))
    }
}

#[derive(Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Config", default)]
    config: Option<ContainerConfig>,
}

#[derive(Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Tty", default)]
    tty: bool,
}

#[derive(Deserialize)]
struct EngineMessage {
    message: String,
}

/// Docker daemon handle, constructed once and shared
pub struct DockerEngine {
    host: DockerHost,
    tty: TtlCache<String, bool>,
    health: TtlCache<(), bool>,
}

impl DockerEngine {
    pub fn new(host: DockerHost) -> Self {
        Self {
            host,
            tty: TtlCache::new(CACHE_TTL),
            health: TtlCache::new(CACHE_TTL),
        }
    }

    /// Drop every cached answer so the next call asks the daemon again
    pub fn invalidate(&self) {
        self.tty.clear();
        self.health.clear();
    }

    /// Issue a GET and return status and body
    async fn get(&self, path_and_query: &str) -> Result<(StatusCode, Bytes), DockerError> {
        let uri = format!("/{API_VERSION}{path_and_query}");
        tracing::trace!(endpoint = %self.host.endpoint(), %uri, "docker request");

        match &self.host {
            #[cfg(unix)]
            DockerHost::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await.map_err(|source| {
                    DockerError::Connect {
                        endpoint: self.host.endpoint(),
                        source,
                    }
                })?;
                send(TokioIo::new(stream), &uri).await
            }
            #[cfg(not(unix))]
            DockerHost::Unix(_) => Err(DockerError::UnsupportedHost(self.host.endpoint())),
            DockerHost::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|source| DockerError::Connect {
                        endpoint: self.host.endpoint(),
                        source,
                    })?;
                send(TokioIo::new(stream), &uri).await
            }
        }
    }

    /// GET that maps non-success statuses to errors
    async fn get_ok(&self, path_and_query: &str, container: &str) -> Result<Bytes, DockerError> {
        let (status, body) = self.get(path_and_query).await?;
        if status.is_success() {
            return Ok(body);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(DockerError::NotFound(container.to_string()));
        }
        let message = serde_json::from_slice::<EngineMessage>(&body)
            .map(|m| m.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
        Err(DockerError::Status { status, message })
    }

    async fn inspect_tty(&self, container: &str) -> Result<bool, DockerError> {
        let body = self
            .get_ok(&format!("/containers/{container}/json"), container)
            .await?;
        let inspect: ContainerInspect = serde_json::from_slice(&body)?;
        Ok(inspect.config.map(|c| c.tty).unwrap_or(false))
    }
}

impl Default for DockerEngine {
    fn default() -> Self {
        Self::new(DockerHost::default())
    }
}

#[async_trait]
impl ContainerRuntime for DockerEngine {
    async fn logs(&self, container: &str, options: &LogsOptions) -> Result<Bytes, DockerError> {
        validate_container_name(container)?;
        let path = format!("/containers/{container}/logs?{}", options.to_query());
        match self.get_ok(&path, container).await {
            Ok(body) => {
                tracing::debug!(container, bytes = body.len(), "fetched container logs");
                Ok(body)
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    async fn is_tty(&self, container: &str) -> Result<bool, DockerError> {
        validate_container_name(container)?;
        if let Some(tty) = self.tty.get(&container.to_string()) {
            return Ok(tty);
        }
        match self.inspect_tty(container).await {
            Ok(tty) => {
                self.tty.set(container.to_string(), tty);
                Ok(tty)
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    async fn ping(&self) -> bool {
        if let Some(up) = self.health.get(&()) {
            return up;
        }
        let up = matches!(self.get("/_ping").await, Ok((status, _)) if status.is_success());
        if !up {
            tracing::debug!(endpoint = %self.host.endpoint(), "docker ping failed");
        }
        self.health.set((), up);
        up
    }
}

/// Send one request over a fresh HTTP/1.1 connection
async fn send<T>(io: T, uri: &str) -> Result<(StatusCode, Bytes), DockerError>
where
    T: hyper::rt::Read + hyper::rt::Write + Send + Unpin + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "docker connection closed with error");
        }
    });

    let request = Request::get(uri)
        .header(header::HOST, "docker")
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, body))
}

/// Container names and ids are spliced into the request path
fn validate_container_name(name: &str) -> Result<(), DockerError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(DockerError::InvalidContainer(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Serve canned responses, reporting each request line
    async fn fake_daemon(
        responses: Vec<(u16, Vec<u8>)>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                }
                let text = String::from_utf8_lossy(&request);
                let _ = tx.send(text.lines().next().unwrap_or_default().to_string());

                let head = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(&body).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (addr, rx)
    }

    #[test]
    fn test_parse_hosts() {
        assert_eq!(
            DockerHost::parse("unix:///var/run/docker.sock").unwrap(),
            DockerHost::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            DockerHost::parse("tcp://10.0.0.2:2375").unwrap(),
            DockerHost::Tcp("10.0.0.2:2375".to_string())
        );
        assert_eq!(
            DockerHost::parse("/run/user/1000/docker.sock").unwrap(),
            DockerHost::Unix(PathBuf::from("/run/user/1000/docker.sock"))
        );
        assert!(DockerHost::parse("ssh://box").is_err());
        assert!(DockerHost::parse("tcp://").is_err());
    }

    #[test]
    fn test_container_name_validation() {
        assert!(validate_container_name("hyos").is_ok());
        assert!(validate_container_name("hyos_server-1.a").is_ok());
        assert!(validate_container_name("").is_err());
        assert!(validate_container_name("../images/json").is_err());
        assert!(validate_container_name("hyos?all=1").is_err());
    }

    #[tokio::test]
    async fn test_logs_returns_raw_body() {
        let framed = vec![1, 0, 0, 0, 0, 0, 0, 3, b'h', b'i', b'\n'];
        let (addr, mut requests) = fake_daemon(vec![(200, framed.clone())]).await;
        let engine = DockerEngine::new(DockerHost::Tcp(addr));

        let options = LogsOptions {
            tail: Some(10),
            since_secs: None,
            timestamps: true,
        };
        let body = engine.logs("hyos", &options).await.unwrap();
        assert_eq!(body.as_ref(), framed.as_slice());

        let line = requests.recv().await.unwrap();
        assert!(line.starts_with("GET /v1.41/containers/hyos/logs?"));
        assert!(line.contains("tail=10"));
        assert!(line.contains("timestamps=1"));
    }

    #[tokio::test]
    async fn test_is_tty_is_cached() {
        let inspect = br#"{"Id":"abc","Config":{"Tty":true}}"#.to_vec();
        let (addr, mut requests) = fake_daemon(vec![(200, inspect)]).await;
        let engine = DockerEngine::new(DockerHost::Tcp(addr));

        assert!(engine.is_tty("hyos").await.unwrap());
        // Served from cache, the fake daemon only answers once
        assert!(engine.is_tty("hyos").await.unwrap());

        let line = requests.recv().await.unwrap();
        assert!(line.starts_with("GET /v1.41/containers/hyos/json"));
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_container() {
        let body = br#"{"message":"No such container: ghost"}"#.to_vec();
        let (addr, _requests) = fake_daemon(vec![(404, body)]).await;
        let engine = DockerEngine::new(DockerHost::Tcp(addr));

        let err = engine
            .logs("ghost", &LogsOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DockerError::NotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_unreachable_socket() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DockerEngine::new(DockerHost::Unix(dir.path().join("docker.sock")));

        let err = engine.is_tty("hyos").await.unwrap_err();
        assert!(matches!(err, DockerError::Connect { .. }));
        assert!(!engine.ping().await);
    }
}
