//! Line-window reads over a directory of rotated log files
//!
//! The game server writes one file per session, named with a sortable
//! timestamp (`2024-01-15_10-30-00_server.log`). Every read lists the
//! directory again and concatenates all files oldest first, so line numbers
//! stay stable across calls until a file is removed.

use std::io::ErrorKind;
use std::ops::Range;
use std::path::PathBuf;

/// File name suffix of the server's log files
pub const DEFAULT_LOG_SUFFIX: &str = "_server.log";

/// Lines returned when the caller sends neither `tail` nor `offset`
pub const DEFAULT_TAIL: usize = 100;

/// A window of lines and the size of the whole source
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TailWindow {
    pub logs: String,
    pub total_lines: usize,
}

/// Stateless reader for rotated log files
#[derive(Clone, Debug)]
pub struct LogFileTailer {
    dir: PathBuf,
    suffix: String,
}

impl LogFileTailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            suffix: DEFAULT_LOG_SUFFIX.to_string(),
        }
    }

    /// Match a different rotation suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Log files in the directory, oldest first
    ///
    /// A missing directory is an empty source, not an error.
    pub async fn list_files(&self) -> Vec<PathBuf> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::trace!(dir = %self.dir.display(), "log directory does not exist");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot list log directory");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name();
                    let matches = name.to_str().is_some_and(|n| n.ends_with(&self.suffix));
                    let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
                    if matches && is_file {
                        files.push(entry.path());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "log directory listing interrupted");
                    break;
                }
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files
    }

    /// All lines of all files, in rotation order
    pub async fn read_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for path in self.list_files().await {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    lines.extend(String::from_utf8_lossy(&bytes).lines().map(str::to_string));
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable log file");
                }
            }
        }
        lines
    }

    /// Read a window of lines
    ///
    /// With `offset > 0` the window starts at that line (incremental mode);
    /// otherwise it is the last `tail` lines.
    pub async fn read(&self, tail: Option<usize>, offset: Option<usize>) -> TailWindow {
        let lines = self.read_lines().await;
        let total_lines = lines.len();
        let range = select_window(total_lines, tail, offset);

        tracing::trace!(
            dir = %self.dir.display(),
            total_lines,
            start = range.start,
            end = range.end,
            "read log window"
        );

        TailWindow {
            logs: lines[range].join("\n"),
            total_lines,
        }
    }
}

/// Pick the line range to return for a request
pub fn select_window(total: usize, tail: Option<usize>, offset: Option<usize>) -> Range<usize> {
    match offset {
        Some(offset) if offset > 0 => {
            let start = offset.min(total);
            let end = match tail {
                Some(tail) => offset.saturating_add(tail).min(total),
                None => total,
            };
            start..end
        }
        // An explicit offset of zero without a tail reads everything, which
        // is what an incremental read from the first line would return.
        _ => {
            let tail = tail.unwrap_or(if offset.is_some() { total } else { DEFAULT_TAIL });
            total.saturating_sub(tail)..total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn line(n: usize) -> String {
        format!("[2024/01/01 00:00:00 INFO] line {n}")
    }

    /// Two sessions: 50 lines then 30 lines
    fn rotated_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let first: Vec<String> = (1..=50).map(line).collect();
        let second: Vec<String> = (51..=80).map(line).collect();
        fs::write(
            dir.path().join("2024-01-01_00-00-00_server.log"),
            first.join("\n") + "\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("2024-01-02_00-00-00_server.log"),
            second.join("\n") + "\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a log\n").unwrap();
        dir
    }

    #[test]
    fn test_select_window_initial() {
        assert_eq!(select_window(80, Some(20), None), 60..80);
        assert_eq!(select_window(10, Some(20), None), 0..10);
        assert_eq!(select_window(500, None, None), 400..500);
        assert_eq!(select_window(0, Some(20), None), 0..0);
    }

    #[test]
    fn test_select_window_incremental() {
        assert_eq!(select_window(81, None, Some(80)), 80..81);
        assert_eq!(select_window(81, Some(100), Some(80)), 80..81);
        assert_eq!(select_window(200, Some(10), Some(80)), 80..90);
        assert_eq!(select_window(50, None, Some(80)), 50..50);
    }

    #[test]
    fn test_select_window_explicit_zero_offset() {
        assert_eq!(select_window(300, None, Some(0)), 0..300);
        assert_eq!(select_window(300, Some(5), Some(0)), 295..300);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = LogFileTailer::new(dir.path().join("Server/logs"));
        assert_eq!(tailer.read(Some(20), None).await, TailWindow::default());
    }

    #[tokio::test]
    async fn test_no_matching_files_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("latest.txt"), "hello\n").unwrap();
        let window = LogFileTailer::new(dir.path()).read(None, None).await;
        assert_eq!(window.total_lines, 0);
        assert!(window.logs.is_empty());
    }

    #[tokio::test]
    async fn test_files_are_read_oldest_first() {
        let dir = rotated_dir();
        let tailer = LogFileTailer::new(dir.path());
        let files = tailer.list_files().await;
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2024-01-01_00-00-00_server.log"));

        let lines = tailer.read_lines().await;
        assert_eq!(lines.len(), 80);
        assert_eq!(lines[0], line(1));
        assert_eq!(lines[79], line(80));
    }

    #[tokio::test]
    async fn test_tail_returns_last_lines_in_order() {
        let dir = rotated_dir();
        let window = LogFileTailer::new(dir.path()).read(Some(20), None).await;
        assert_eq!(window.total_lines, 80);
        let expected: Vec<String> = (61..=80).map(line).collect();
        assert_eq!(window.logs, expected.join("\n"));
    }

    #[tokio::test]
    async fn test_poll_returns_appended_line() {
        let dir = rotated_dir();
        let tailer = LogFileTailer::new(dir.path());
        assert_eq!(tailer.read(None, Some(80)).await.logs, "");

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("2024-01-02_00-00-00_server.log"))
            .unwrap();
        writeln!(file, "{}", line(81)).unwrap();

        let window = tailer.read(None, Some(80)).await;
        assert_eq!(window.total_lines, 81);
        assert_eq!(window.logs, line(81));
    }

    #[tokio::test]
    async fn test_file_without_trailing_newline_does_not_merge() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_server.log"), "one\ntwo").unwrap();
        fs::write(dir.path().join("b_server.log"), "three\n").unwrap();
        let lines = LogFileTailer::new(dir.path()).read_lines().await;
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_custom_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("game.log"), "x\n").unwrap();
        let tailer = LogFileTailer::new(dir.path()).with_suffix(".log");
        assert_eq!(tailer.read(None, None).await.total_lines, 1);
    }
}
