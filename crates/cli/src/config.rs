//! Configuration loading and management

use anyhow::{Context, Result};
use crosscast_adapters::{
    farcaster::{DEFAULT_MAX_CAST_BYTES, DEFAULT_NEYNAR_URL},
    twitter::DEFAULT_RAPIDAPI_HOST,
};
use crosscast_domain::usecases::CrosspostConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub twitter: TwitterConfig,

    #[serde(default)]
    pub farcaster: FarcasterConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub dry_run: bool,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default = "default_twitter_base_url")]
    pub base_url: String,

    #[serde(default = "default_rapidapi_host")]
    pub rapidapi_host: String,

    #[serde(default = "default_rapidapi_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarcasterConfig {
    #[serde(default = "default_neynar_base_url")]
    pub base_url: String,

    #[serde(default = "default_neynar_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_cast_bytes")]
    pub max_cast_bytes: usize,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./crosscast.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    4
}

fn default_call_timeout() -> u64 {
    30
}

fn default_lease_ttl() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    300
}

fn default_twitter_base_url() -> String {
    format!("https://{}", DEFAULT_RAPIDAPI_HOST)
}

fn default_rapidapi_host() -> String {
    DEFAULT_RAPIDAPI_HOST.to_string()
}

fn default_rapidapi_key_env() -> String {
    "RAPIDAPI_KEY".to_string()
}

fn default_http_timeout() -> u64 {
    20
}

fn default_neynar_base_url() -> String {
    DEFAULT_NEYNAR_URL.to_string()
}

fn default_neynar_key_env() -> String {
    "NEYNAR_API_KEY".to_string()
}

fn default_max_cast_bytes() -> usize {
    DEFAULT_MAX_CAST_BYTES
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            log_level: default_log_level(),
            dry_run: default_true(),
            max_concurrent: default_max_concurrent(),
            call_timeout_secs: default_call_timeout(),
            lease_ttl_secs: default_lease_ttl(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            base_url: default_twitter_base_url(),
            rapidapi_host: default_rapidapi_host(),
            api_key_env: default_rapidapi_key_env(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for FarcasterConfig {
    fn default() -> Self {
        Self {
            base_url: default_neynar_base_url(),
            api_key_env: default_neynar_key_env(),
            max_cast_bytes: default_max_cast_bytes(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("CROSSCAST")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Log level from the config, before logging is set up. Load errors are
    /// reported later by the command itself.
    pub fn log_level_hint(config_path: Option<&Path>) -> String {
        Self::load(config_path)
            .map(|c| c.general.log_level)
            .unwrap_or_else(|_| default_log_level())
    }

    /// Coordinator settings; `force_dry_run` comes from the command line
    pub fn crosspost_config(&self, force_dry_run: bool) -> CrosspostConfig {
        CrosspostConfig {
            dry_run: force_dry_run || self.general.dry_run,
            max_concurrent: self.general.max_concurrent.max(1),
            call_timeout: Duration::from_secs(self.general.call_timeout_secs),
            lease_ttl: Duration::from_secs(self.general.lease_ttl_secs),
        }
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# crosscast configuration

[general]
state_db_path = "./crosscast.sqlite"
log_level = "info"
# Set to false to actually publish casts
dry_run = true
max_concurrent = 4
# Bound on each timeline fetch and cast publish
call_timeout_secs = 30
# A crashed run's lock on a user expires after this long
lease_ttl_secs = 300

[schedule]
poll_interval_secs = 300

[twitter]
base_url = "https://twitter241.p.rapidapi.com"
rapidapi_host = "twitter241.p.rapidapi.com"
api_key_env = "RAPIDAPI_KEY"
timeout_secs = 20

[farcaster]
base_url = "https://api.neynar.com"
api_key_env = "NEYNAR_API_KEY"
max_cast_bytes = 320
timeout_secs = 20

[server]
bind = "127.0.0.1:8080"
"#
        .to_string()
    }
}
