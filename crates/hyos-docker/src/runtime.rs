use async_trait::async_trait;
use bytes::Bytes;

use crate::DockerError;

/// Options for a one-shot (non-follow) log read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogsOptions {
    /// Number of trailing lines, `None` for the whole log
    pub tail: Option<usize>,
    /// Only lines after this epoch second
    pub since_secs: Option<i64>,
    /// Prefix each line with an RFC 3339 timestamp
    pub timestamps: bool,
}

impl LogsOptions {
    /// Query string for `GET /containers/{id}/logs`
    pub fn to_query(&self) -> String {
        let tail = self
            .tail
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string());
        let mut query = format!(
            "stdout=1&stderr=1&follow=0&timestamps={}&tail={}",
            u8::from(self.timestamps),
            tail
        );
        if let Some(since) = self.since_secs.filter(|s| *s > 0) {
            query.push_str(&format!("&since={since}"));
        }
        query
    }
}

/// The slice of a container runtime the log pipeline consumes
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Raw log bytes, multiplexed unless the container has a TTY
    async fn logs(&self, container: &str, options: &LogsOptions) -> Result<Bytes, DockerError>;

    /// Whether the container allocates a pseudo-terminal
    async fn is_tty(&self, container: &str) -> Result<bool, DockerError>;

    /// Whether the runtime answers at all
    async fn ping(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_to_whole_log() {
        let options = LogsOptions::default();
        assert_eq!(
            options.to_query(),
            "stdout=1&stderr=1&follow=0&timestamps=0&tail=all"
        );
    }

    #[test]
    fn test_query_with_tail_and_since() {
        let options = LogsOptions {
            tail: Some(100),
            since_secs: Some(1_700_000_000),
            timestamps: true,
        };
        assert_eq!(
            options.to_query(),
            "stdout=1&stderr=1&follow=0&timestamps=1&tail=100&since=1700000000"
        );
    }

    #[test]
    fn test_query_ignores_zero_since() {
        let options = LogsOptions {
            tail: Some(5),
            since_secs: Some(0),
            timestamps: true,
        };
        assert!(!options.to_query().contains("since"));
    }
}
