use chrono::Utc;
use hyos_types::{LogEntry, TimeRange};

/// Compiled filter for log entries
#[derive(Clone, Debug, Default)]
pub struct CompiledFilter {
    /// Exact level word to keep (`None` = all)
    level: Option<String>,

    /// Maximum age of an entry
    time_range: TimeRange,

    /// Lowercased search text (empty = none)
    search: String,
}

impl CompiledFilter {
    /// A filter that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one level word (`WARN`, `SEVERE`, ...); `all` clears it
    pub fn with_level(mut self, word: &str) -> Self {
        let word = word.trim();
        self.level = if word.is_empty() || word.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(word.to_string())
        };
        self
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }

    /// Case-insensitive substring over message, component, level, time and date
    pub fn with_search(mut self, text: &str) -> Self {
        self.search = text.trim().to_lowercase();
        self
    }

    /// Check if a log entry matches this filter
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.matches_at(entry, Utc::now().timestamp_millis())
    }

    /// Check a match against an explicit clock (epoch milliseconds)
    pub fn matches_at(&self, entry: &LogEntry, now_ms: i64) -> bool {
        if let Some(level) = &self.level {
            if !entry.level.eq_ignore_ascii_case(level) {
                return false;
            }
        }

        // Entries without a parseable time are never hidden by age
        if let Some(width) = self.time_range.as_millis() {
            if entry.timestamp != 0 && entry.timestamp < now_ms - width {
                return false;
            }
        }

        self.search.is_empty() || self.search_matches(entry)
    }

    fn search_matches(&self, entry: &LogEntry) -> bool {
        let component = entry.component.as_deref().unwrap_or_default();
        [
            entry.message.as_str(),
            component,
            entry.level.as_str(),
            entry.time.as_str(),
            entry.date.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&self.search))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_705_314_600_000;

    fn entry(level: &str, component: Option<&str>, message: &str, timestamp: i64) -> LogEntry {
        LogEntry {
            date: "2024/01/15".to_string(),
            time: "10:30:00".to_string(),
            level: level.to_string(),
            component: component.map(str::to_string),
            message: message.to_string(),
            raw: format!("[2024/01/15 10:30:00 {level}] {message}"),
            timestamp,
            is_multi_line: false,
        }
    }

    #[test]
    fn test_level_filter_is_exact_word() {
        let filter = CompiledFilter::all().with_level("WARN");
        assert!(filter.matches_at(&entry("WARN", None, "a", NOW), NOW));
        assert!(filter.matches_at(&entry("warn", None, "a", NOW), NOW));
        assert!(!filter.matches_at(&entry("WARNING", None, "a", NOW), NOW));
        assert!(!filter.matches_at(&entry("INFO", None, "a", NOW), NOW));

        let info = CompiledFilter::all().with_level("INFO");
        assert!(!info.matches_at(&entry("CONFIG", None, "a", NOW), NOW));
        assert!(!CompiledFilter::all().with_level("FINE").matches_at(&entry("DEBUG", None, "a", NOW), NOW));
    }

    #[test]
    fn test_unknown_level_hides_unstructured_lines() {
        let filter = CompiledFilter::all().with_level("BOGUS");
        assert!(!filter.matches_at(&LogEntry::unstructured("plain"), NOW));
        assert!(!filter.matches_at(&entry("INFO", None, "a", NOW), NOW));
    }

    #[test]
    fn test_level_all_matches_everything() {
        let filter = CompiledFilter::all().with_level("WARN").with_level("all");
        assert!(filter.matches_at(&entry("INFO", None, "a", NOW), NOW));
        assert!(filter.matches_at(&LogEntry::unstructured("plain"), NOW));
    }

    #[test]
    fn test_time_range() {
        let filter = CompiledFilter::all().with_time_range(TimeRange::LastHour);
        let two_hours = 2 * 60 * 60 * 1000;
        assert!(filter.matches_at(&entry("INFO", None, "recent", NOW - 1000), NOW));
        assert!(!filter.matches_at(&entry("INFO", None, "old", NOW - two_hours), NOW));
        // Undated entries always pass
        assert!(filter.matches_at(&entry("INFO", None, "undated", 0), NOW));
        assert!(
            CompiledFilter::all()
                .with_time_range(TimeRange::LastDay)
                .matches_at(&entry("INFO", None, "old", NOW - two_hours), NOW)
        );
    }

    #[test]
    fn test_search_fields() {
        let e = entry("INFO", Some("World"), "Saved 12 chunks", NOW);
        assert!(CompiledFilter::all().with_search("CHUNKS").matches_at(&e, NOW));
        assert!(CompiledFilter::all().with_search("world").matches_at(&e, NOW));
        assert!(CompiledFilter::all().with_search("info").matches_at(&e, NOW));
        assert!(CompiledFilter::all().with_search("10:30").matches_at(&e, NOW));
        assert!(CompiledFilter::all().with_search("2024/01").matches_at(&e, NOW));
        assert!(!CompiledFilter::all().with_search("player").matches_at(&e, NOW));
    }
}
