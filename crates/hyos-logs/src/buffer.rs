use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use hyos_types::{LogEntry, LogLevel};

/// Entries a client keeps before dropping the oldest
pub const MAX_ENTRIES: usize = 10_000;

/// Thread-safe bounded buffer for parsed log entries
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage, oldest first
    entries: Arc<RwLock<VecDeque<LogEntry>>>,

    /// Maximum capacity
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(MAX_ENTRIES)
    }
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            capacity,
        }
    }

    /// Append a batch, then drop the oldest entries down to capacity
    pub fn push_batch(&self, batch: Vec<LogEntry>) {
        let mut entries = self.entries.write();
        entries.extend(batch);
        let excess = entries.len().saturating_sub(self.capacity);
        if excess > 0 {
            entries.drain(..excess);
        }
    }

    /// Replace the contents, keeping only the newest `capacity` entries
    pub fn replace(&self, batch: Vec<LogEntry>) {
        let skip = batch.len().saturating_sub(self.capacity);
        let mut entries = self.entries.write();
        entries.clear();
        entries.extend(batch.into_iter().skip(skip));
    }

    /// Get all entries (cloned for rendering)
    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Get entries filtered by a predicate
    pub fn filtered<F>(&self, predicate: F) -> Vec<LogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries
            .read()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Get entry count per log level
    pub fn level_counts(&self) -> LevelCounts {
        let entries = self.entries.read();
        let mut counts = LevelCounts::default();

        for entry in entries.iter() {
            match entry.severity() {
                LogLevel::Trace => counts.trace += 1,
                LogLevel::Debug => counts.debug += 1,
                LogLevel::Info => counts.info += 1,
                LogLevel::Warn => counts.warn += 1,
                LogLevel::Error => counts.error += 1,
                LogLevel::Fatal => counts.fatal += 1,
                LogLevel::Unknown => counts.unknown += 1,
            }
        }

        counts
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Export all entries as raw lines
    pub fn export_raw(&self) -> String {
        self.entries
            .read()
            .iter()
            .map(|e| e.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get the last N entries
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }
}

/// Counts per log level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub trace: usize,
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
    pub unknown: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.trace + self.debug + self.info + self.warn + self.error + self.fatal + self.unknown
    }
}
