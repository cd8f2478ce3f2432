//! Background poll loop for one open log view
//!
//! The loop owns the timer and the request bookkeeping; the buffer lives in
//! a shared [`TailState`] that callers read between events.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hyos_types::{LogEntry, LogFetchResponse};

use crate::api::{FetchError, LogsApi};
use crate::state::{DEFAULT_INITIAL_LIMIT, TailState};

/// Default time between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Options for a log view
#[derive(Clone, Copy, Debug)]
pub struct ViewOptions {
    pub interval: Duration,
    pub initial_limit: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            initial_limit: DEFAULT_INITIAL_LIMIT,
        }
    }
}

/// Commands accepted by a running view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewCommand {
    Pause,
    Resume,
    ClearView,
    Resynchronize,
    Close,
}

/// Updates emitted by a running view
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// A response was applied; `entries` are the ones it added, in order
    Synced { entries: Vec<LogEntry>, rotated: bool },
    /// A fetch failed; the buffer is unchanged
    Failed(String),
    /// The visible entries were cleared
    Cleared,
    /// The view forgot its cursor and is fetching a fresh tail, on request
    /// or because the log source switched
    Reset,
}

/// Handle to a polling log view
pub struct LogView {
    state: Arc<RwLock<TailState>>,
    commands: mpsc::UnboundedSender<ViewCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LogView {
    /// Start polling; the first fetch is issued immediately
    pub fn spawn(
        api: Arc<dyn LogsApi>,
        options: ViewOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let state = Arc::new(RwLock::new(TailState::new(options.initial_limit)));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let poller = Poller::new(api, Arc::clone(&state), event_tx, cancel.clone());
        let task = tokio::spawn(poller.run(options.interval, command_rx));

        let view = Self {
            state,
            commands: command_tx,
            cancel,
            task: Some(task),
        };
        (view, event_rx)
    }

    /// Read access to the buffer and cursor
    pub fn state(&self) -> RwLockReadGuard<'_, TailState> {
        self.state.read()
    }

    pub fn send(&self, command: ViewCommand) {
        // The loop only goes away after close, when commands are moot
        let _ = self.commands.send(command);
    }

    pub fn pause(&self) {
        self.send(ViewCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(ViewCommand::Resume);
    }

    pub fn clear_view(&self) {
        self.send(ViewCommand::ClearView);
    }

    pub fn resynchronize(&self) {
        self.send(ViewCommand::Resynchronize);
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop polling and wait for the loop to exit
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LogView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Poll loop
// ============================================================================

/// A finished request, tagged with what was current when it was issued
struct Completion {
    seq: u64,
    generation: u64,
    result: Result<LogFetchResponse, FetchError>,
}

struct Poller {
    api: Arc<dyn LogsApi>,
    state: Arc<RwLock<TailState>>,
    events: mpsc::UnboundedSender<ViewEvent>,
    cancel: CancellationToken,

    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,

    /// Bumped by clear and resynchronize; older responses are dropped
    generation: u64,
    next_seq: u64,
    last_applied: u64,
    in_flight: Option<u64>,
    paused: bool,
}

impl Poller {
    fn new(
        api: Arc<dyn LogsApi>,
        state: Arc<RwLock<TailState>>,
        events: mpsc::UnboundedSender<ViewEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            api,
            state,
            events,
            cancel,
            completions_tx,
            completions_rx,
            generation: 0,
            next_seq: 0,
            last_applied: 0,
            in_flight: None,
            paused: false,
        }
    }

    async fn run(mut self, interval: Duration, mut commands: mpsc::UnboundedReceiver<ViewCommand>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                command = commands.recv() => match command {
                    Some(ViewCommand::Close) | None => break,
                    Some(ViewCommand::Pause) => self.paused = true,
                    Some(ViewCommand::Resume) => {
                        self.paused = false;
                        ticker.reset_immediately();
                    }
                    Some(ViewCommand::ClearView) => {
                        self.generation += 1;
                        self.state.write().clear_view();
                        self.emit(ViewEvent::Cleared);
                    }
                    Some(ViewCommand::Resynchronize) => {
                        self.generation += 1;
                        self.state.write().resynchronize();
                        self.emit(ViewEvent::Reset);
                        self.request();
                    }
                },

                _ = ticker.tick(), if !self.paused => {
                    if self.in_flight.is_none() {
                        self.request();
                    } else {
                        tracing::trace!("previous log request still in flight, skipping tick");
                    }
                }

                Some(done) = self.completions_rx.recv() => self.complete(done),
            }
        }

        self.cancel.cancel();
        tracing::debug!("log view closed");
    }

    fn request(&mut self) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let generation = self.generation;
        let query = self.state.read().next_query();
        self.in_flight = Some(seq);

        let api = Arc::clone(&self.api);
        let tx = self.completions_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = api.fetch(&query) => {
                    let _ = tx.send(Completion { seq, generation, result });
                }
            }
        });
    }

    fn complete(&mut self, done: Completion) {
        if self.in_flight == Some(done.seq) {
            self.in_flight = None;
        }
        if self.cancel.is_cancelled() {
            return;
        }
        if done.generation != self.generation || done.seq <= self.last_applied {
            tracing::trace!(seq = done.seq, "discarding stale log response");
            return;
        }
        self.last_applied = done.seq;

        match done.result {
            Ok(response) => {
                let (applied, entries) = {
                    let mut state = self.state.write();
                    let applied = state.apply(response);
                    let entries = state.recent(applied.appended);
                    (applied, entries)
                };
                if applied.refetch {
                    self.emit(ViewEvent::Reset);
                    self.request();
                    return;
                }
                self.emit(ViewEvent::Synced {
                    entries,
                    rotated: applied.rotated,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "log fetch failed");
                self.state.write().fail(&e);
                self.emit(ViewEvent::Failed(e.to_string()));
            }
        }
    }

    fn emit(&self, event: ViewEvent) {
        let _ = self.events.send(event);
    }
}
