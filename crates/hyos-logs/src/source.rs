use std::sync::Arc;

use chrono::Utc;
use hyos_docker::{ContainerRuntime, DockerError, LogsOptions};
use hyos_types::{LogFetchResponse, LogQuery, LogSource};

use crate::auth::AuthScanner;
use crate::demux::demultiplex;
use crate::tailer::{DEFAULT_TAIL, LogFileTailer, TailWindow};

/// Serves log requests from files, falling back to the container runtime
pub struct LogSourceSelector {
    /// Rotated log files (tried first, needs no runtime access)
    tailer: LogFileTailer,

    /// Container runtime, if one is configured
    runtime: Option<Arc<dyn ContainerRuntime>>,

    /// Container whose output is read on fallback
    container: String,

    /// Runtime tail when the request carries none
    default_tail: usize,
}

impl LogSourceSelector {
    pub fn new(tailer: LogFileTailer, container: impl Into<String>) -> Self {
        Self {
            tailer,
            runtime: None,
            container: container.into(),
            default_tail: DEFAULT_TAIL,
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_default_tail(mut self, tail: usize) -> Self {
        self.default_tail = tail;
        self
    }

    /// Answer one request of the log endpoint
    pub async fn fetch(&self, query: &LogQuery) -> LogFetchResponse {
        let (source, window) = self.select(query).await;
        let auth = AuthScanner::scan(&window.logs);

        tracing::debug!(
            %source,
            total_lines = window.total_lines,
            incremental = query.is_incremental(),
            auth_waiting = auth.waiting,
            "served log request"
        );

        LogFetchResponse {
            logs: window.logs,
            auth,
            source,
            timestamp: Utc::now().timestamp_millis(),
            total_lines: window.total_lines,
        }
    }

    async fn select(&self, query: &LogQuery) -> (LogSource, TailWindow) {
        let window = self.tailer.read(query.tail, query.offset).await;
        if window.total_lines > 0 {
            return (LogSource::File, window);
        }

        let Some(runtime) = &self.runtime else {
            return (LogSource::None, TailWindow::default());
        };

        match self.read_runtime(runtime.as_ref(), query).await {
            Ok(logs) if !logs.is_empty() => {
                // The stream has no global line count; the blob is all we know
                let total_lines = logs.lines().count();
                (LogSource::Docker, TailWindow { logs, total_lines })
            }
            Ok(_) => (LogSource::None, TailWindow::default()),
            Err(e) => {
                tracing::debug!(container = %self.container, error = %e, "container logs unavailable");
                (LogSource::None, TailWindow::default())
            }
        }
    }

    async fn read_runtime(
        &self,
        runtime: &dyn ContainerRuntime,
        query: &LogQuery,
    ) -> Result<String, DockerError> {
        let tty = runtime.is_tty(&self.container).await?;
        let options = LogsOptions {
            tail: Some(query.tail.unwrap_or(self.default_tail)),
            since_secs: query.since.map(|ms| ms / 1000),
            timestamps: true,
        };
        let bytes = runtime.logs(&self.container, &options).await?;
        Ok(demultiplex(&bytes, tty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::fs;

    use crate::demux::{StreamKind, encode_frame};

    /// In-memory runtime recording the options it was called with
    struct FakeRuntime {
        tty: bool,
        output: Result<Vec<u8>, ()>,
        calls: Mutex<Vec<LogsOptions>>,
    }

    impl FakeRuntime {
        fn framed(lines: &[&str]) -> Self {
            let output = lines
                .iter()
                .flat_map(|l| encode_frame(StreamKind::Stdout, format!("{l}\n").as_bytes()))
                .collect();
            Self {
                tty: false,
                output: Ok(output),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                tty: false,
                output: Err(()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn logs(&self, container: &str, options: &LogsOptions) -> Result<Bytes, DockerError> {
            self.calls.lock().push(*options);
            match &self.output {
                Ok(bytes) => Ok(Bytes::from(bytes.clone())),
                Err(()) => Err(DockerError::NotFound(container.to_string())),
            }
        }

        async fn is_tty(&self, _container: &str) -> Result<bool, DockerError> {
            Ok(self.tty)
        }

        async fn ping(&self) -> bool {
            self.output.is_ok()
        }
    }

    #[tokio::test]
    async fn test_files_win_over_runtime() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_server.log"), "[2024/01/01 00:00:00 INFO] from file\n").unwrap();
        let runtime = Arc::new(FakeRuntime::framed(&["from docker"]));
        let selector = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos")
            .with_runtime(runtime.clone());

        let response = selector.fetch(&LogQuery::initial(10)).await;
        assert_eq!(response.source, LogSource::File);
        assert_eq!(response.logs, "[2024/01/01 00:00:00 INFO] from file");
        assert_eq!(response.total_lines, 1);
        assert!(runtime.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_poll_without_new_lines_stays_on_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_server.log"), "one\ntwo\n").unwrap();
        let runtime = Arc::new(FakeRuntime::framed(&["from docker"]));
        let selector = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos")
            .with_runtime(runtime.clone());

        let response = selector.fetch(&LogQuery::poll(2)).await;
        assert_eq!(response.source, LogSource::File);
        assert_eq!(response.logs, "");
        assert_eq!(response.total_lines, 2);
        assert!(runtime.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::framed(&[
            "2024-01-15T10:30:00Z [2024/01/15 10:30:00 INFO] booting",
            "2024-01-15T10:30:01Z [2024/01/15 10:30:01 INFO] ready",
        ]));
        let selector = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos")
            .with_runtime(runtime.clone());

        let query = LogQuery {
            tail: Some(50),
            offset: None,
            since: Some(1_705_314_000_000),
        };
        let response = selector.fetch(&query).await;
        assert_eq!(response.source, LogSource::Docker);
        assert_eq!(response.total_lines, 2);
        assert!(response.logs.ends_with("ready\n"));

        let calls = runtime.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tail, Some(50));
        assert_eq!(calls[0].since_secs, Some(1_705_314_000));
        assert!(calls[0].timestamps);
    }

    #[tokio::test]
    async fn test_runtime_default_tail() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::framed(&["x"]));
        let selector = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos")
            .with_runtime(runtime.clone())
            .with_default_tail(250);

        selector.fetch(&LogQuery::poll(40)).await;
        assert_eq!(runtime.calls.lock()[0].tail, Some(250));
    }

    #[tokio::test]
    async fn test_unavailable_everywhere_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let selector = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos")
            .with_runtime(Arc::new(FakeRuntime::unreachable()));

        let response = selector.fetch(&LogQuery::initial(10)).await;
        assert_eq!(response.source, LogSource::None);
        assert_eq!(response.logs, "");
        assert_eq!(response.total_lines, 0);
        assert!(!response.auth.waiting);
        assert!(response.timestamp > 0);

        let no_runtime = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos");
        assert_eq!(
            no_runtime.fetch(&LogQuery::initial(10)).await.source,
            LogSource::None
        );
    }

    #[tokio::test]
    async fn test_auth_prompt_is_scanned() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a_server.log"),
            "[2024/01/01 00:00:00 INFO] [Auth] https://oauth.accounts.hytale.com/oauth2/device/verify?user_code=ABC123\n\
             [2024/01/01 00:00:00 INFO] [Auth] Authorization code: XYZ789\n",
        )
        .unwrap();
        let selector = LogSourceSelector::new(LogFileTailer::new(dir.path()), "hyos");

        let response = selector.fetch(&LogQuery::initial(10)).await;
        assert!(response.auth.waiting);
        assert_eq!(response.auth.code.as_deref(), Some("XYZ789"));
    }
}
