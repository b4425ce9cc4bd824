//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{CastDraft, PostRecord, SourcePost, User};

/// Error type for tweet source operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid source user ID '{0}': expected a numeric ID")]
    InvalidUser(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed timeline: {0}")]
    Parse(String),
}

/// Port for fetching the latest tweet of a source account
#[async_trait]
pub trait TweetSource: Send + Sync {
    /// Fetch the most recent tweet for a numeric source user ID.
    /// `Ok(None)` means the timeline held no usable tweet.
    async fn latest_post(&self, source_user_id: &str) -> Result<Option<SourcePost>, FetchError>;
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Content too long: {len} > {max}")]
    ContentTooLong { len: usize, max: usize },
}

/// Result of a successful publish operation
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedCast {
    /// Cast hash or outbox entry ID, if the publisher produced one
    pub hash: Option<String>,
}

/// Port for publishing casts under a user's signer
#[async_trait]
pub trait CastPublisher: Send + Sync {
    /// Publish a cast. A successful call means exactly one cast was created.
    async fn publish(&self, signer_uuid: &str, cast: &CastDraft)
    -> Result<PublishedCast, PublishError>;

    /// Get the platform name (e.g., "farcaster", "outbox")
    fn platform(&self) -> &'static str;
}

/// Error type for sync store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the user/post store
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Users with cross-posting switched on
    async fn list_enabled_users(&self) -> Result<Vec<User>, StoreError>;

    /// All users, oldest first
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_signer(&self, signer_uuid: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_twitter_id(
        &self,
        twitter_user_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Insert a user, or update the profile and connection fields of an
    /// existing one. The sync position (`last_post_id`, `last_post_at`) is
    /// only written on insert; afterwards it moves through
    /// [`record_crosspost`](Self::record_crosspost) and
    /// [`set_sync_position`](Self::set_sync_position).
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    /// Overwrite a user's sync position, e.g. with a fresh baseline.
    /// Fails with `NotFound` for an unknown user.
    async fn set_sync_position(
        &self,
        user_id: Uuid,
        last_post_id: Option<&str>,
        last_post_at: Option<OffsetDateTime>,
    ) -> Result<(), StoreError>;

    /// Append a post record and advance the owner's last post ID and timestamp,
    /// as one transaction.
    async fn record_crosspost(&self, record: &PostRecord) -> Result<(), StoreError>;

    /// Newest-first post records of a user
    async fn recent_posts(&self, user_id: Uuid, limit: usize)
    -> Result<Vec<PostRecord>, StoreError>;

    /// Take the user's sync lease if it is free or expired.
    /// Returns `false` when another owner holds an unexpired lease.
    async fn acquire_lease(
        &self,
        user_id: Uuid,
        owner: Uuid,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Release a lease held by `owner`; a lease held by someone else is left alone
    async fn release_lease(&self, user_id: Uuid, owner: Uuid) -> Result<(), StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
