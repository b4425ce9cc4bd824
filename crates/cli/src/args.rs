//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

/// crosscast: mirrors each connected user's latest tweet to Farcaster
#[derive(Parser, Debug)]
#[command(name = "crosscast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cross-post new tweets, once or on a fixed interval
    Run(RunArgs),

    /// Serve the HTTP trigger endpoint
    Serve(ServeArgs),

    /// Manage connected users
    Users(UsersArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run in dry-run mode (no actual publishing)
    #[arg(long)]
    pub dry_run: bool,

    /// Run one sync pass and exit
    #[arg(long)]
    pub once: bool,

    /// Write casts to this JSONL file for review instead of publishing
    #[arg(long)]
    pub outbox: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind, overrides server.bind
    #[arg(long)]
    pub bind: Option<String>,

    /// Run in dry-run mode (no actual publishing)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommands,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// Connect a user (or reattach a disconnected platform)
    Add(AddUserArgs),

    /// List all users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Turn cross-posting on for a user
    Enable { user_id: Uuid },

    /// Turn cross-posting off for a user
    Disable { user_id: Uuid },

    /// Remove a user's Twitter connection
    DisconnectTwitter { user_id: Uuid },

    /// Remove a user's Farcaster connection
    DisconnectFarcaster { user_id: Uuid },

    /// Show a user's recent cross-posts
    Posts {
        user_id: Uuid,

        /// Maximum number of posts to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddUserArgs {
    /// Neynar signer UUID
    #[arg(long)]
    pub signer: String,

    /// Farcaster ID
    #[arg(long)]
    pub fid: Option<u64>,

    /// Farcaster username
    #[arg(long)]
    pub farcaster_username: Option<String>,

    /// Numeric Twitter user ID
    #[arg(long)]
    pub twitter_id: Option<String>,

    /// Twitter handle, without the leading @
    #[arg(long)]
    pub twitter_username: Option<String>,

    /// Do not record the current latest tweet as already seen
    #[arg(long)]
    pub skip_baseline: bool,

    /// Enable cross-posting right away
    #[arg(long)]
    pub enable: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
