//! Account use cases - connecting, disconnecting and opting users in

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    model::{PostRecord, SourcePost, User, is_valid_source_user_id},
    ports::{Clock, StoreError, SyncStore, TweetSource},
};

/// Identifiers gathered by the external auth flows
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub farcaster_signer_uuid: String,
    pub farcaster_fid: Option<u64>,
    pub farcaster_username: Option<String>,
    pub twitter_user_id: Option<String>,
    pub twitter_username: Option<String>,
}

/// Result of connecting a user
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// A new user was registered
    Created(User),
    /// A disconnected platform was attached to an existing user
    Reconnected(User),
    /// The signer already belongs to a connected user; nothing changed
    Existing(User),
}

impl ConnectOutcome {
    pub fn user(&self) -> &User {
        match self {
            ConnectOutcome::Created(user)
            | ConnectOutcome::Reconnected(user)
            | ConnectOutcome::Existing(user) => user,
        }
    }
}

/// Errors from account use cases
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Farcaster signer UUID is required")]
    MissingSigner,
    #[error("Twitter information is required for new users")]
    MissingTwitter,
    #[error("Invalid Twitter user ID '{0}': expected a numeric ID")]
    InvalidTwitterId(String),
    #[error("User not found: {0}")]
    NotFound(Uuid),
    #[error("Cannot enable cross-posting: {0} is not connected")]
    NotConnected(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Account management over the sync store
pub struct Accounts<St, S, Cl>
where
    St: SyncStore + ?Sized,
    S: TweetSource + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<St>,
    source: Arc<S>,
    clock: Arc<Cl>,
}

impl<St, S, Cl> Accounts<St, S, Cl>
where
    St: SyncStore + ?Sized,
    S: TweetSource + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(store: Arc<St>, source: Arc<S>, clock: Arc<Cl>) -> Self {
        Self {
            store,
            source,
            clock,
        }
    }

    /// Register a user, or attach a platform that was disconnected earlier.
    ///
    /// New users start with cross-posting disabled. With `fetch_baseline`, the
    /// current latest tweet is stored as already seen so enabling sync does not
    /// mirror old tweets.
    pub async fn connect(
        &self,
        new_user: NewUser,
        fetch_baseline: bool,
    ) -> Result<ConnectOutcome, AccountError> {
        let signer = new_user.farcaster_signer_uuid.trim().to_string();
        if signer.is_empty() {
            return Err(AccountError::MissingSigner);
        }

        let twitter = match (&new_user.twitter_user_id, &new_user.twitter_username) {
            (Some(id), Some(username)) if !id.trim().is_empty() && !username.trim().is_empty() => {
                let id = id.trim();
                if !is_valid_source_user_id(id) {
                    return Err(AccountError::InvalidTwitterId(id.to_string()));
                }
                Some((id.to_string(), username.trim().trim_start_matches('@').to_string()))
            }
            _ => None,
        };

        if let Some(mut existing) = self.store.find_user_by_signer(&signer).await? {
            if existing.has_twitter() {
                tracing::info!(user_id = %existing.id, "User already exists");
                return Ok(ConnectOutcome::Existing(existing));
            }
            let Some((twitter_user_id, twitter_username)) = twitter else {
                return Ok(ConnectOutcome::Existing(existing));
            };
            existing.twitter_user_id = twitter_user_id;
            existing.twitter_username = twitter_username;
            self.store.save_user(&existing).await?;

            // A position from the old account means nothing for the new one
            let baseline = self.baseline(&existing.twitter_user_id, fetch_baseline).await;
            existing.last_post_id = baseline.as_ref().map(|post| post.id.clone());
            existing.last_post_at = baseline.map(|post| post.created_at);
            self.store
                .set_sync_position(
                    existing.id,
                    existing.last_post_id.as_deref(),
                    existing.last_post_at,
                )
                .await?;

            tracing::info!(
                user_id = %existing.id,
                baseline = ?existing.last_post_id,
                "Reconnected Twitter"
            );
            return Ok(ConnectOutcome::Reconnected(existing));
        }

        let Some((twitter_user_id, twitter_username)) = twitter else {
            return Err(AccountError::MissingTwitter);
        };

        if let Some(mut existing) = self.store.find_user_by_twitter_id(&twitter_user_id).await? {
            if !existing.has_farcaster() {
                existing.farcaster_signer_uuid = signer;
                existing.farcaster_fid = new_user.farcaster_fid;
                existing.farcaster_username = new_user.farcaster_username;
                self.store.save_user(&existing).await?;

                // Tweets posted while Farcaster was away are not mirrored.
                // Without a fresh baseline the stored position stays.
                if let Some(post) = self.baseline(&existing.twitter_user_id, fetch_baseline).await {
                    self.store
                        .set_sync_position(existing.id, Some(&post.id), Some(post.created_at))
                        .await?;
                }
                let existing = self.load(existing.id).await?;

                tracing::info!(
                    user_id = %existing.id,
                    baseline = ?existing.last_post_id,
                    "Reconnected Farcaster"
                );
                return Ok(ConnectOutcome::Reconnected(existing));
            }
        }

        let baseline = self.baseline(&twitter_user_id, fetch_baseline).await;
        let user = User {
            id: Uuid::new_v4(),
            twitter_user_id,
            twitter_username,
            farcaster_signer_uuid: signer,
            farcaster_fid: new_user.farcaster_fid,
            farcaster_username: new_user.farcaster_username,
            crosspost_enabled: false,
            last_post_id: baseline.as_ref().map(|post| post.id.clone()),
            last_post_at: baseline.map(|post| post.created_at),
            created_at: self.clock.now(),
        };
        self.store.save_user(&user).await?;

        tracing::info!(
            user_id = %user.id,
            handle = %user.handle(),
            baseline = ?user.last_post_id,
            "Registered user"
        );

        Ok(ConnectOutcome::Created(user))
    }

    /// The account's current latest tweet, to be stored as already seen
    async fn baseline(&self, twitter_user_id: &str, fetch_baseline: bool) -> Option<SourcePost> {
        if !fetch_baseline {
            return None;
        }

        match self.source.latest_post(twitter_user_id).await {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(
                    twitter_user_id = %twitter_user_id,
                    error = %e,
                    "Failed to fetch baseline tweet; the latest tweet will be cross-posted once enabled"
                );
                None
            }
        }
    }

    /// Switch cross-posting on or off. Enabling needs both platforms connected.
    pub async fn set_crosspost_enabled(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> Result<User, AccountError> {
        let mut user = self.load(user_id).await?;

        if enabled {
            if !user.has_twitter() {
                return Err(AccountError::NotConnected("Twitter"));
            }
            if !user.has_farcaster() {
                return Err(AccountError::NotConnected("Farcaster"));
            }
        }

        user.crosspost_enabled = enabled;
        self.store.save_user(&user).await?;
        tracing::info!(user_id = %user.id, enabled, "Updated crosspost setting");
        self.load(user_id).await
    }

    /// Clear the Twitter connection and its sync position, and disable sync
    pub async fn disconnect_twitter(&self, user_id: Uuid) -> Result<User, AccountError> {
        let mut user = self.load(user_id).await?;
        user.twitter_user_id.clear();
        user.twitter_username.clear();
        user.last_post_id = None;
        user.last_post_at = None;
        user.crosspost_enabled = false;
        self.store.save_user(&user).await?;
        self.store.set_sync_position(user.id, None, None).await?;
        tracing::info!(user_id = %user.id, "Disconnected Twitter");
        Ok(user)
    }

    /// Clear the Farcaster connection and disable sync
    pub async fn disconnect_farcaster(&self, user_id: Uuid) -> Result<User, AccountError> {
        let mut user = self.load(user_id).await?;
        user.farcaster_signer_uuid.clear();
        user.farcaster_fid = None;
        user.farcaster_username = None;
        user.crosspost_enabled = false;
        self.store.save_user(&user).await?;
        tracing::info!(user_id = %user.id, "Disconnected Farcaster");
        self.load(user_id).await
    }

    pub async fn recent_posts(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PostRecord>, AccountError> {
        self.load(user_id).await?;
        Ok(self.store.recent_posts(user_id, limit).await?)
    }

    pub async fn list(&self) -> Result<Vec<User>, AccountError> {
        Ok(self.store.list_users().await?)
    }

    async fn load(&self, user_id: Uuid) -> Result<User, AccountError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AccountError::NotFound(user_id))
    }
}
