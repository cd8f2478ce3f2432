use hyos_logs::{CompiledFilter, LevelCounts, LogBuffer, LogParser};
use hyos_types::{AuthPrompt, LogEntry, LogFetchResponse, LogQuery, LogSource};

/// Entries requested by the first fetch of a view
pub const DEFAULT_INITIAL_LIMIT: usize = 2000;

/// What a response did to the buffer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Applied {
    /// Entries added by this response
    pub appended: usize,
    /// The buffer was replaced (first fetch or rotation)
    pub rotated: bool,
    /// The source switched; the cursor was dropped and a fresh tail is needed
    pub refetch: bool,
}

/// Client-side cursor and buffer of one log view
pub struct TailState {
    /// Parsed entries, capped at `hyos_logs::MAX_ENTRIES`
    buffer: LogBuffer,

    /// First fetch completed
    initialized: bool,

    /// Lines already delivered by the source
    offset: usize,

    /// Source size as of the last response
    total_lines: usize,

    /// Raw text of the newest delivered entry, for overlap detection
    last_raw_line: Option<String>,

    source: LogSource,
    auth: AuthPrompt,
    error: Option<String>,
    is_loading: bool,
    initial_limit: usize,
}

impl Default for TailState {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_LIMIT)
    }
}

impl TailState {
    pub fn new(initial_limit: usize) -> Self {
        Self::with_buffer(initial_limit, LogBuffer::default())
    }

    /// Use a buffer with a different capacity
    pub fn with_buffer(initial_limit: usize, buffer: LogBuffer) -> Self {
        Self {
            buffer,
            initialized: false,
            offset: 0,
            total_lines: 0,
            last_raw_line: None,
            source: LogSource::None,
            auth: AuthPrompt::default(),
            error: None,
            is_loading: true,
            initial_limit,
        }
    }

    /// Query for the next fetch: a tail until initialized, then the offset
    ///
    /// The stream source has no offset and answers every poll with a tail, so
    /// polls against it ask for the same tail as the first fetch. That keeps
    /// its line-count estimate from shrinking unless the container restarted.
    pub fn next_query(&self) -> LogQuery {
        if !self.initialized {
            return LogQuery::initial(self.initial_limit);
        }
        let mut query = LogQuery::poll(self.offset);
        if self.source == LogSource::Docker {
            query.tail = Some(self.initial_limit);
        }
        query
    }

    /// Fold a response into the buffer and cursor
    pub fn apply(&mut self, response: LogFetchResponse) -> Applied {
        let entries = LogParser::parse_lines(&response.logs);
        let source_changed = response.source != self.source;

        self.error = None;
        self.is_loading = false;
        self.auth = response.auth;
        self.source = response.source;

        if !self.initialized {
            self.initialized = true;
            return self.reset_to(entries, response.total_lines);
        }

        // The cursor belongs to the previous source; start over with a tail
        if source_changed {
            tracing::debug!(
                source = %self.source,
                offset = self.offset,
                "log source switched, refetching tail"
            );
            self.resynchronize();
            return Applied {
                refetch: true,
                ..Applied::default()
            };
        }

        if response.total_lines < self.total_lines {
            tracing::debug!(
                source = %self.source,
                previous = self.total_lines,
                total_lines = response.total_lines,
                "log source rotated, resetting view"
            );
            return self.reset_to(entries, response.total_lines);
        }

        let batch = if self.source == LogSource::Docker {
            self.skip_delivered(entries)
        } else {
            entries
        };

        if batch.is_empty() {
            self.total_lines = response.total_lines;
            return Applied::default();
        }

        let appended = batch.len();
        self.last_raw_line = batch.last().map(|e| e.raw.clone());
        self.buffer.push_batch(batch);
        self.offset = response.total_lines;
        self.total_lines = response.total_lines;

        Applied {
            appended,
            ..Applied::default()
        }
    }

    /// Record a failed fetch; the buffer and cursor are kept for the retry
    pub fn fail(&mut self, error: impl ToString) {
        self.error = Some(error.to_string());
        self.is_loading = false;
    }

    /// Empty the visible entries but keep following from the same offset
    pub fn clear_view(&mut self) {
        self.buffer.clear();
        self.error = None;
    }

    /// Forget everything; the next fetch is an initial one
    pub fn resynchronize(&mut self) {
        self.buffer.clear();
        self.initialized = false;
        self.offset = 0;
        self.total_lines = 0;
        self.last_raw_line = None;
        self.error = None;
        self.is_loading = true;
    }

    fn reset_to(&mut self, entries: Vec<LogEntry>, total_lines: usize) -> Applied {
        let appended = entries.len();
        self.last_raw_line = entries.last().map(|e| e.raw.clone());
        self.buffer.replace(entries);
        self.offset = total_lines;
        self.total_lines = total_lines;
        Applied {
            appended,
            rotated: true,
            refetch: false,
        }
    }

    /// Drop the overlap with what was already delivered
    fn skip_delivered(&self, mut entries: Vec<LogEntry>) -> Vec<LogEntry> {
        let Some(last) = &self.last_raw_line else {
            return entries;
        };
        match entries.iter().rposition(|e| &e.raw == last) {
            Some(pos) => entries.split_off(pos + 1),
            None => entries,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer.all()
    }

    /// The newest `n` entries
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        self.buffer.tail(n)
    }

    pub fn filtered(&self, filter: &CompiledFilter) -> Vec<LogEntry> {
        self.buffer.filtered(|e| filter.matches(e))
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.buffer.level_counts()
    }

    /// Raw text of every buffered entry, oldest first
    pub fn export_raw(&self) -> String {
        self.buffer.export_raw()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn source(&self) -> LogSource {
        self.source
    }

    pub fn auth(&self) -> &AuthPrompt {
        &self.auth
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }
}
