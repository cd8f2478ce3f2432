//! Polling client for the hyos log endpoint
//!
//! A view fetches a tail of the server log once, then follows it with
//! offset-based polls, detecting rotation and keeping a bounded buffer.

mod api;
mod state;
mod view;

pub use api::{FetchError, HttpLogsApi, LOGS_PATH, LogsApi};
pub use state::{Applied, DEFAULT_INITIAL_LIMIT, TailState};
pub use view::{DEFAULT_POLL_INTERVAL, LogView, ViewCommand, ViewEvent, ViewOptions};
