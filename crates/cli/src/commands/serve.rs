//! Serve command - HTTP trigger for an external scheduler

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use crosscast_domain::CrosspostResult;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::ServeArgs;
use crate::commands::{DynCrossposter, build_crossposter};
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct TriggerResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<CrosspostResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn router(crossposter: Arc<DynCrossposter>) -> Router {
    Router::new()
        .route("/api/crosspost", post(trigger))
        .route("/health", get(health))
        .with_state(crossposter)
}

async fn trigger(
    State(crossposter): State<Arc<DynCrossposter>>,
) -> (StatusCode, Json<TriggerResponse>) {
    match crossposter.run_once().await {
        Ok(report) => (
            StatusCode::OK,
            Json(TriggerResponse {
                success: true,
                results: Some(report.results()),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Triggered crosspost run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TriggerResponse {
                    success: false,
                    results: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn execute(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let crossposter = build_crossposter(&config, args.dry_run, None).await?;

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!(
        bind = %bind,
        dry_run = crossposter.config().dry_run,
        "Serving crosspost trigger"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    axum::serve(listener, router(Arc::new(crossposter)))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
