//! Log processing for hyos-manager
//!
//! This crate provides frame demultiplexing, rotated-file tailing, source
//! selection, parsing, auth-prompt detection, buffering and filtering.

mod auth;
mod buffer;
mod demux;
mod filter;
mod parser;
mod source;
mod tailer;

pub use auth::AuthScanner;
pub use buffer::{LevelCounts, LogBuffer, MAX_ENTRIES};
pub use demux::{Frame, FrameDecoder, HEADER_LEN, StreamKind, demultiplex, encode_frame};
pub use filter::CompiledFilter;
pub use parser::LogParser;
pub use source::LogSourceSelector;
pub use tailer::{DEFAULT_LOG_SUFFIX, DEFAULT_TAIL, LogFileTailer, TailWindow, select_window};

// Re-export types used in our public API
pub use hyos_types::{AuthPrompt, LogEntry, LogLevel, LogSource, TimeRange};
