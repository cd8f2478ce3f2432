use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use hyos_docker::{ContainerRuntime, DockerEngine};
use hyos_logs::{LogFileTailer, LogSourceSelector};
use hyos_types::LogQuery;

use crate::config::ServerConfig;

/// Shared handler state, built once at startup
#[derive(Clone)]
pub struct AppState {
    selector: Arc<LogSourceSelector>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl AppState {
    pub fn new(selector: LogSourceSelector, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            selector: Arc::new(selector),
            runtime,
        }
    }

    /// Wire the Docker engine and the log directory from configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        let runtime: Arc<dyn ContainerRuntime> =
            Arc::new(DockerEngine::new(config.docker_host.clone()));
        let tailer = LogFileTailer::new(&config.log_dir).with_suffix(&config.log_suffix);
        let selector = LogSourceSelector::new(tailer, &config.container_name)
            .with_runtime(Arc::clone(&runtime))
            .with_default_tail(config.default_tail);
        Self::new(selector, runtime)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/server/logs", get(get_logs))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::from_config(&config);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen))?;

    tracing::info!(
        listen = %listener.local_addr()?,
        log_dir = %config.log_dir.display(),
        container = %config.container_name,
        "log server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn get_logs(
    State(state): State<AppState>,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(query)) => Json(state.selector.fetch(&query).await).into_response(),
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "rejected log query");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let docker = state.runtime.ping().await;
    Json(json!({ "status": "ok", "docker": docker }))
}
