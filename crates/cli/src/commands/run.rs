//! Run command - sync once or on a fixed interval

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::interval;

use crate::args::RunArgs;
use crate::commands::build_crossposter;
use crate::config::AppConfig;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let crossposter = build_crossposter(&config, args.dry_run, args.outbox.clone()).await?;

    tracing::info!(
        dry_run = crossposter.config().dry_run,
        once = args.once,
        outbox = ?args.outbox,
        max_concurrent = crossposter.config().max_concurrent,
        "Starting crosscast run"
    );

    if args.once {
        crossposter
            .run_once()
            .await
            .context("Crosspost run failed")?;
    } else {
        let poll_interval = Duration::from_secs(config.schedule.poll_interval_secs.max(1));
        let mut ticker = interval(poll_interval);

        // Set up graceful shutdown
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        };

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = crossposter.run_once().await {
                        tracing::error!(error = %e, "Crosspost run failed");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down gracefully");
                    break;
                }
            }
        }
    }

    tracing::info!("crosscast run completed");
    Ok(())
}
