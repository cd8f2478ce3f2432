//! Container runtime access for the hyos log pipeline
//!
//! This crate talks to the Docker Engine API to fetch container logs as the
//! raw multiplexed byte stream and to inspect whether a container allocates a
//! TTY. Decoding the stream is left to the caller.

mod cache;
mod engine;
mod error;
mod runtime;

pub use cache::TtlCache;
pub use engine::{DockerEngine, DockerHost};
pub use error::DockerError;
pub use runtime::{ContainerRuntime, LogsOptions};
