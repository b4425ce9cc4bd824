//! crosscast adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `state`: SQLite and in-memory sync stores
//! - `twitter`: RapidAPI timeline source
//! - `farcaster`: Neynar cast publisher
//! - `outbox`: JSONL publisher for review mode

pub mod outbox;
mod state_memory;
mod state_sqlite;

pub mod neynar;
pub mod twitter_api;

/// Re-exports for state adapters
pub mod state {
    pub use crate::state_memory::InMemorySyncStore;
    pub use crate::state_sqlite::SqliteSyncStore;
}

/// Re-exports for Twitter adapters
pub mod twitter {
    pub use crate::twitter_api::{DEFAULT_RAPIDAPI_HOST, RapidApiTweetSource, StubTweetSource};
}

/// Re-exports for Farcaster adapters
pub mod farcaster {
    pub use crate::neynar::{
        DEFAULT_MAX_CAST_BYTES, DEFAULT_NEYNAR_URL, NeynarCastPublisher, SignerState,
        SignerStatus, StubCast, StubCastPublisher,
    };
}
