use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use hyos_client::{HttpLogsApi, LogView, ViewEvent, ViewOptions};
use hyos_logs::{CompiledFilter, LevelCounts};
use hyos_types::{AuthPrompt, LogEntry};

/// Follow the manager's log endpoint and print matching entries
///
/// With `export`, the buffered raw lines are written to that file on exit.
pub async fn run(
    base_url: &str,
    options: ViewOptions,
    filter: CompiledFilter,
    export: Option<&Path>,
) -> Result<()> {
    let api = HttpLogsApi::new(base_url).context("Failed to create log client")?;
    tracing::debug!(endpoint = api.endpoint(), interval = ?options.interval, "following logs");

    let (view, mut events) = LogView::spawn(Arc::new(api), options);
    let mut shown_auth = AuthPrompt::default();
    let mut printed = false;
    let stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ViewEvent::Synced { entries, rotated } => {
                        let auth = view.state().auth().clone();
                        let mut out = stdout.lock();
                        if rotated && printed {
                            writeln!(out, "--- log source reset ---")?;
                        }
                        for entry in entries.iter().filter(|e| filter.matches(e)) {
                            writeln!(out, "{}", format_entry(entry))?;
                            printed = true;
                        }
                        out.flush()?;

                        if auth != shown_auth {
                            if let (true, Some(url), Some(code)) = (auth.waiting, &auth.url, &auth.code) {
                                eprintln!("Server is waiting for authorization: open {url} and enter code {code}");
                            }
                            shown_auth = auth;
                        }
                    }
                    ViewEvent::Failed(e) => eprintln!("fetch failed: {e} (retrying)"),
                    ViewEvent::Cleared | ViewEvent::Reset => {}
                }
            }
        }
    }

    let (raw, counts) = {
        let state = view.state();
        (state.export_raw(), state.level_counts())
    };
    view.close().await;
    tracing::info!("{}", summary(&counts));

    if let Some(path) = export {
        tokio::fs::write(path, raw)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), entries = counts.total(), "exported log buffer");
    }
    Ok(())
}

pub fn poll_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

/// Entry totals per severity, for the exit line
fn summary(counts: &LevelCounts) -> String {
    format!(
        "{} entries: {} error, {} warn, {} info, {} debug, {} other",
        counts.total(),
        counts.error + counts.fatal,
        counts.warn,
        counts.info,
        counts.debug + counts.trace,
        counts.unknown
    )
}

/// One entry per line group, aligned on the level column
fn format_entry(entry: &LogEntry) -> String {
    if entry.level.is_empty() {
        return entry.message.clone();
    }
    let component = entry
        .component
        .as_deref()
        .map(|c| format!("[{c}] "))
        .unwrap_or_default();
    format!(
        "{} {} {:<5} {}{}",
        entry.date, entry.time, entry.level, component, entry.message
    )
}
