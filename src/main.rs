mod config;
mod server;
mod tail;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use hyos_client::{DEFAULT_INITIAL_LIMIT, ViewOptions};
use hyos_logs::CompiledFilter;
use hyos_types::TimeRange;

use crate::config::{FileConfig, Overrides, ServerConfig};

/// hyos-manager - log ingestion and tailing for a containerised game server
#[derive(Parser, Debug)]
#[command(name = "hyos-manager")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the log endpoint
    Serve(ServeArgs),

    /// Follow a running server's log endpoint
    Tail(TailArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on (default 0.0.0.0:3000)
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Game server container name
    #[arg(long, value_name = "NAME")]
    container: Option<String>,

    /// Directory of rotated server log files
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TailArgs {
    /// Base URL of the manager
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Lines fetched when the view opens
    #[arg(long, default_value_t = DEFAULT_INITIAL_LIMIT)]
    initial_limit: usize,

    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Only show this level (INFO, WARN, SEVERE, ...)
    #[arg(long)]
    level: Option<String>,

    /// Case-insensitive text to look for
    #[arg(long)]
    search: Option<String>,

    /// Only show entries from the last hour, day or week
    #[arg(long, default_value = "all")]
    range: TimeRange,

    /// Write the buffered raw lines to this file on exit
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Serve(args) => run_server(args).await,
        Command::Tail(args) => run_tail(args).await,
    };

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_server(args: ServeArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path).await?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        listen: args.listen,
        container_name: args.container,
        log_dir: args.log_dir,
    };
    let config = ServerConfig::resolve(file, overrides, |key| std::env::var(key).ok())?;
    tracing::debug!(?config, "resolved configuration");

    server::serve(config).await
}

async fn run_tail(args: TailArgs) -> Result<()> {
    let mut filter = CompiledFilter::all().with_time_range(args.range);
    if let Some(level) = &args.level {
        filter = filter.with_level(level);
    }
    if let Some(search) = &args.search {
        filter = filter.with_search(search);
    }

    let options = ViewOptions {
        interval: tail::poll_interval(args.interval),
        initial_limit: args.initial_limit,
    };
    tail::run(&args.url, options, filter, args.export.as_deref()).await
}
