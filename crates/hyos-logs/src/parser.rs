use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;

use hyos_types::LogEntry;

/// `[YYYY/MM/DD HH:MM:SS LEVEL] [Component] message`
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(\d{4}/\d{2}/\d{2})\s+(\d{2}:\d{2}:\d{2})\s+(\w+)\]\s+(?:\[([^\]]+)\]\s*)?(.*)$",
    )
    .expect("header pattern is valid")
});

/// Log parser for the game server's plain-text format
pub struct LogParser;

impl LogParser {
    /// Parse a text blob into entries, folding continuation lines
    ///
    /// Lines that do not start with a header belong to the entry above them
    /// (stack traces, wrapped messages). Folding only looks back within this
    /// call, so a continuation at the top of a blob becomes its own entry.
    pub fn parse_lines(text: &str) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = Vec::new();

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }

            let (stamp, content) = Self::split_runtime_timestamp(line);
            if content.trim().is_empty() {
                continue;
            }
            if let Some(mut entry) = Self::parse_header(content) {
                entry.raw = line.to_string();
                entries.push(entry);
            } else if let Some(last) = entries.last_mut() {
                last.fold(line, content);
            } else {
                let mut entry = LogEntry::unstructured(content);
                entry.raw = line.to_string();
                entry.timestamp = stamp.unwrap_or(0);
                entries.push(entry);
            }
        }

        entries
    }

    /// Parse a single line that starts with a header
    pub fn parse_header(line: &str) -> Option<LogEntry> {
        let caps = HEADER.captures(line)?;
        let date = caps.get(1)?.as_str();
        let time = caps.get(2)?.as_str();

        Some(LogEntry {
            date: date.to_string(),
            time: time.to_string(),
            level: caps.get(3)?.as_str().to_string(),
            component: caps.get(4).map(|m| m.as_str().to_string()),
            message: caps.get(5).map(|m| m.as_str()).unwrap_or_default().to_string(),
            raw: line.to_string(),
            timestamp: Self::timestamp_millis(date, time),
            is_multi_line: false,
        })
    }

    /// Split off the RFC 3339 prefix the container runtime adds to each line
    ///
    /// Returns the prefix as epoch milliseconds and the remaining content.
    /// Lines without a prefix come back unchanged.
    fn split_runtime_timestamp(line: &str) -> (Option<i64>, &str) {
        // 2024-01-15T10:30:00Z is the shortest form
        let Some((first, rest)) = line.split_once(' ') else {
            return (None, line);
        };
        if first.len() < 20 || !first.ends_with('Z') {
            return (None, line);
        }
        match DateTime::parse_from_rfc3339(first) {
            Ok(ts) => (Some(ts.timestamp_millis()), rest),
            Err(_) => (None, line),
        }
    }

    /// Epoch milliseconds for a header's date and time (UTC), 0 if invalid
    fn timestamp_millis(date: &str, time: &str) -> i64 {
        let stamp = format!("{} {}", date.replace('/', "-"), time);
        NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S")
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or(0)
    }
}
