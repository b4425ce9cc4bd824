//! In-memory sync store for testing and offline mode

use async_trait::async_trait;
use crosscast_domain::{PostRecord, StoreError, SyncStore, User};
use std::collections::HashMap;
use std::sync::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

struct Lease {
    owner: Uuid,
    expires_at: OffsetDateTime,
}

/// In-memory sync store implementation
pub struct InMemorySyncStore {
    users: RwLock<Vec<User>>,
    posts: RwLock<Vec<PostRecord>>,
    leases: RwLock<HashMap<Uuid, Lease>>,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            posts: RwLock::new(Vec::new()),
            leases: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store seeded with users
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
            ..Self::new()
        }
    }

    fn find_user(&self, predicate: impl Fn(&User) -> bool) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(users.iter().find(|u| predicate(u)).cloned())
    }
}

impl Default for InMemorySyncStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncStore for InMemorySyncStore {
    async fn list_enabled_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(users.iter().filter(|u| u.crosspost_enabled).cloned().collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(users.clone())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.find_user(|u| u.id == user_id)
    }

    async fn find_user_by_signer(&self, signer_uuid: &str) -> Result<Option<User>, StoreError> {
        if signer_uuid.is_empty() {
            return Ok(None);
        }
        self.find_user(|u| u.farcaster_signer_uuid == signer_uuid)
    }

    async fn find_user_by_twitter_id(
        &self,
        twitter_user_id: &str,
    ) -> Result<Option<User>, StoreError> {
        if twitter_user_id.is_empty() {
            return Ok(None);
        }
        self.find_user(|u| u.twitter_user_id == twitter_user_id)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                let last_post_id = existing.last_post_id.take();
                let last_post_at = existing.last_post_at;
                *existing = User {
                    last_post_id,
                    last_post_at,
                    ..user.clone()
                };
            }
            None => users.push(user.clone()),
        }
        Ok(())
    }

    async fn set_sync_position(
        &self,
        user_id: Uuid,
        last_post_id: Option<&str>,
        last_post_at: Option<OffsetDateTime>,
    ) -> Result<(), StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        user.last_post_id = last_post_id.map(str::to_string);
        user.last_post_at = last_post_at;
        Ok(())
    }

    async fn record_crosspost(&self, record: &PostRecord) -> Result<(), StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let mut posts = self
            .posts
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let user = users
            .iter_mut()
            .find(|u| u.id == record.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", record.user_id)))?;

        user.last_post_id = Some(record.source_post_id.clone());
        user.last_post_at = Some(record.source_posted_at);
        posts.push(record.clone());
        Ok(())
    }

    async fn recent_posts(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(posts
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn acquire_lease(
        &self,
        user_id: Uuid,
        owner: Uuid,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut leases = self
            .leases
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if let Some(lease) = leases.get(&user_id) {
            if lease.owner != owner && lease.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(user_id, Lease { owner, expires_at });
        Ok(true)
    }

    async fn release_lease(&self, user_id: Uuid, owner: Uuid) -> Result<(), StoreError> {
        let mut leases = self
            .leases
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if leases.get(&user_id).is_some_and(|l| l.owner == owner) {
            leases.remove(&user_id);
        }
        Ok(())
    }
}
