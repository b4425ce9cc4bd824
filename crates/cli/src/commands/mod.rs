//! Subcommand implementations and the wiring they share

pub mod config;
pub mod doctor;
pub mod run;
pub mod serve;
pub mod users;

use anyhow::{Context, Result, bail};
use crosscast_adapters::{
    farcaster::{NeynarCastPublisher, StubCastPublisher},
    outbox::{OutboxCastPublisher, OutboxWriter},
    state::SqliteSyncStore,
    twitter::RapidApiTweetSource,
};
use crosscast_domain::{
    CastPublisher, Clock, SyncStore, SystemClock, TweetSource, usecases::Crossposter,
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

/// Coordinator over trait objects, as wired by the CLI
pub type DynCrossposter =
    Crossposter<dyn TweetSource, dyn CastPublisher, dyn SyncStore, dyn Clock>;

pub(crate) fn load_api_key(env_var: &str, provider: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No API key env var configured for {}", provider);
    }

    let key = std::env::var(env_var)
        .with_context(|| format!("Missing API key env var {} for {}", env_var, provider))?;

    if key.trim().is_empty() {
        bail!("API key env var {} is empty for {}", env_var, provider);
    }

    Ok(SecretString::new(key.into()))
}

pub(crate) async fn open_store(config: &AppConfig) -> Result<Arc<SqliteSyncStore>> {
    let store = SqliteSyncStore::new(&config.general.state_db_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open state database: {}",
                config.general.state_db_path.display()
            )
        })?;
    Ok(Arc::new(store))
}

pub(crate) fn build_tweet_source(config: &AppConfig) -> Result<RapidApiTweetSource> {
    let api_key = load_api_key(&config.twitter.api_key_env, "twitter")?;
    Ok(RapidApiTweetSource::with_base_url(
        api_key,
        config.twitter.rapidapi_host.clone(),
        config.twitter.base_url.clone(),
        Duration::from_secs(config.twitter.timeout_secs),
    ))
}

/// Pick the publisher: outbox when reviewing, a disabled stub when nothing
/// will be published, Neynar otherwise.
pub(crate) async fn build_cast_publisher(
    config: &AppConfig,
    dry_run: bool,
    outbox: Option<PathBuf>,
) -> Result<Arc<dyn CastPublisher>> {
    if let Some(path) = outbox {
        let writer = OutboxWriter::new(path.clone())
            .await
            .with_context(|| format!("Failed to initialize outbox: {}", path.display()))?;
        tracing::info!(outbox = %writer.path().display(), "Writing casts to outbox");
        return Ok(Arc::new(OutboxCastPublisher::new(writer)));
    }

    if dry_run {
        return Ok(Arc::new(StubCastPublisher::new(false)));
    }

    let api_key = load_api_key(&config.farcaster.api_key_env, "farcaster")?;
    Ok(Arc::new(NeynarCastPublisher::with_base_url(
        api_key,
        config.farcaster.base_url.clone(),
        config.farcaster.max_cast_bytes,
        Duration::from_secs(config.farcaster.timeout_secs),
    )))
}

/// Build the coordinator from config. An outbox overrides dry-run.
pub(crate) async fn build_crossposter(
    config: &AppConfig,
    force_dry_run: bool,
    outbox: Option<PathBuf>,
) -> Result<DynCrossposter> {
    let mut crosspost_config = config.crosspost_config(force_dry_run);
    if outbox.is_some() && crosspost_config.dry_run {
        tracing::info!("--outbox overrides dry-run");
        crosspost_config.dry_run = false;
    }

    let store: Arc<dyn SyncStore> = open_store(config).await?;
    let source: Arc<dyn TweetSource> = Arc::new(build_tweet_source(config)?);
    let publisher = build_cast_publisher(config, crosspost_config.dry_run, outbox).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(Crossposter::new(
        source,
        publisher,
        store,
        clock,
        crosspost_config,
    ))
}
