//! Crosspost use case - mirrors each enabled user's latest tweet as a cast

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::timeout;
use uuid::Uuid;

use crate::{
    model::{
        CastDraft, CrosspostResult, PostRecord, SkipReason, SourcePost, SyncOutcome, User,
        UserSync,
    },
    normalize::normalize_cast_text,
    ports::{CastPublisher, Clock, SyncStore, TweetSource},
};

/// Configuration for a crosspost run
#[derive(Debug, Clone)]
pub struct CrosspostConfig {
    /// Dry run mode (don't actually publish)
    pub dry_run: bool,
    /// Maximum users synced at the same time
    pub max_concurrent: usize,
    /// Bound on each fetch and publish call
    pub call_timeout: Duration,
    /// How long a user's sync lease is valid
    pub lease_ttl: Duration,
}

impl Default for CrosspostConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_concurrent: 4,
            call_timeout: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(300),
        }
    }
}

/// Outcome of one run over all enabled users
#[derive(Debug, Clone)]
pub struct CrosspostReport {
    /// Run ID, also used as the lease owner
    pub run_id: Uuid,
    /// One entry per enabled user, in completion order
    pub users: Vec<UserSync>,
}

impl CrosspostReport {
    /// Trigger results: one per user that cast, would have cast, or failed
    pub fn results(&self) -> Vec<CrosspostResult> {
        self.users
            .iter()
            .filter_map(CrosspostResult::from_sync)
            .collect()
    }

    pub fn crossposted(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Crossposted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                SyncOutcome::Failed { .. } | SyncOutcome::Unrecorded { .. }
            )
        })
    }

    fn count(&self, predicate: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.users.iter().filter(|u| predicate(&u.outcome)).count()
    }
}

/// Crosspost coordinator
#[derive(Clone)]
pub struct Crossposter<S, P, St, Cl>
where
    S: TweetSource + ?Sized,
    P: CastPublisher + ?Sized,
    St: SyncStore + ?Sized,
    Cl: Clock + ?Sized,
{
    source: Arc<S>,
    publisher: Arc<P>,
    store: Arc<St>,
    clock: Arc<Cl>,
    config: CrosspostConfig,
}

impl<S, P, St, Cl> Crossposter<S, P, St, Cl>
where
    S: TweetSource + ?Sized,
    P: CastPublisher + ?Sized,
    St: SyncStore + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        publisher: Arc<P>,
        store: Arc<St>,
        clock: Arc<Cl>,
        config: CrosspostConfig,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CrosspostConfig {
        &self.config
    }

    /// Run one pass over every enabled user.
    ///
    /// Only a failure to list users fails the run; every per-user error ends
    /// up in that user's outcome.
    pub async fn run_once(&self) -> Result<CrosspostReport, CrosspostError> {
        let users = self
            .store
            .list_enabled_users()
            .await
            .map_err(|e| CrosspostError::ListUsers(e.to_string()))?;

        let run_id = Uuid::new_v4();

        tracing::info!(
            run_id = %run_id,
            users = users.len(),
            dry_run = self.config.dry_run,
            publisher = self.publisher.platform(),
            "Starting crosspost run"
        );

        let mut synced = Vec::with_capacity(users.len());
        let max_concurrent = self.config.max_concurrent.max(1);
        let mut tasks: FuturesUnordered<BoxFuture<'_, UserSync>> = FuturesUnordered::new();
        let mut users_iter = users.into_iter();

        loop {
            while tasks.len() < max_concurrent {
                let Some(user) = users_iter.next() else {
                    break;
                };
                tasks.push(Box::pin(self.sync_user(user, run_id)));
            }

            match tasks.next().await {
                Some(result) => synced.push(result),
                None => break,
            }
        }

        let report = CrosspostReport {
            run_id,
            users: synced,
        };

        tracing::info!(
            run_id = %run_id,
            users = report.users.len(),
            crossposted = report.crossposted(),
            failed = report.failed(),
            "Crosspost run complete"
        );

        Ok(report)
    }

    async fn sync_user(&self, user: User, run_id: Uuid) -> UserSync {
        let outcome = if user.is_connected() {
            self.sync_with_lease(user.id, run_id).await
        } else {
            SyncOutcome::Skipped {
                reason: SkipReason::NotConnected,
            }
        };

        match &outcome {
            SyncOutcome::Crossposted {
                source_post_id,
                destination_ref,
                ..
            } => {
                tracing::info!(
                    user_id = %user.id,
                    handle = %user.handle(),
                    source_post_id = %source_post_id,
                    destination_ref = ?destination_ref,
                    "Crossposted tweet"
                );
            }
            SyncOutcome::Skipped { reason } => {
                tracing::debug!(user_id = %user.id, reason = %reason, "Skipped");
            }
            SyncOutcome::Failed { error, .. } => {
                tracing::error!(user_id = %user.id, handle = %user.handle(), error = %error, "Crosspost failed");
            }
            SyncOutcome::Unrecorded { .. } | SyncOutcome::DryRun { .. } => {}
        }

        UserSync {
            user_id: user.id,
            handle: user.handle().to_string(),
            outcome,
        }
    }

    async fn sync_with_lease(&self, user_id: Uuid, owner: Uuid) -> SyncOutcome {
        let now = self.clock.now();
        let expires_at = now + self.config.lease_ttl;

        match self
            .store
            .acquire_lease(user_id, owner, now, expires_at)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return SyncOutcome::Skipped {
                    reason: SkipReason::LeaseHeld,
                };
            }
            Err(e) => {
                return SyncOutcome::Failed {
                    source_post_id: None,
                    text: None,
                    error: format!("Failed to acquire sync lease: {}", e),
                };
            }
        }

        let outcome = self.sync_leased(user_id).await;

        if let Err(e) = self.store.release_lease(user_id, owner).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to release sync lease");
        }

        outcome
    }

    async fn sync_leased(&self, user_id: Uuid) -> SyncOutcome {
        // Re-read under the lease so a run that just finished is observed
        let user = match self.store.get_user(user_id).await {
            Ok(Some(user)) if user.crosspost_enabled && user.is_connected() => user,
            Ok(_) => {
                return SyncOutcome::Skipped {
                    reason: SkipReason::NotConnected,
                };
            }
            Err(e) => {
                return SyncOutcome::Failed {
                    source_post_id: None,
                    text: None,
                    error: format!("Failed to load user: {}", e),
                };
            }
        };

        let fetched = match timeout(
            self.config.call_timeout,
            self.source.latest_post(&user.twitter_user_id),
        )
        .await
        {
            Ok(Ok(post)) => post,
            Ok(Err(e)) => {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to fetch latest tweet");
                return SyncOutcome::Skipped {
                    reason: SkipReason::FetchFailed(e.to_string()),
                };
            }
            Err(_) => {
                return SyncOutcome::Failed {
                    source_post_id: None,
                    text: None,
                    error: format!(
                        "Fetch timed out after {}s",
                        self.config.call_timeout.as_secs()
                    ),
                };
            }
        };

        let post = match select_new_post(&user, fetched) {
            Ok(post) => post,
            Err(reason) => return SyncOutcome::Skipped { reason },
        };

        let text = normalize_cast_text(&post.text);
        if text.is_empty() {
            return SyncOutcome::Skipped {
                reason: SkipReason::EmptyText,
            };
        }

        let draft = CastDraft {
            text,
            embeds: post.media_urls.clone(),
            source_post_id: post.id.clone(),
        };

        if self.config.dry_run {
            tracing::info!(
                user_id = %user.id,
                source_post_id = %draft.source_post_id,
                text = %draft.text,
                embeds = ?draft.embeds,
                "[DRY RUN] Would cast"
            );
            return SyncOutcome::DryRun {
                source_post_id: draft.source_post_id,
                text: draft.text,
            };
        }

        let published = match timeout(
            self.config.call_timeout,
            self.publisher.publish(&user.farcaster_signer_uuid, &draft),
        )
        .await
        {
            Ok(Ok(published)) => published,
            Ok(Err(e)) => {
                return SyncOutcome::Failed {
                    source_post_id: Some(draft.source_post_id),
                    text: Some(draft.text),
                    error: e.to_string(),
                };
            }
            Err(_) => {
                return SyncOutcome::Failed {
                    source_post_id: Some(draft.source_post_id),
                    text: Some(draft.text),
                    error: format!(
                        "Publish timed out after {}s",
                        self.config.call_timeout.as_secs()
                    ),
                };
            }
        };

        let record = PostRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            source_post_id: draft.source_post_id,
            text: draft.text,
            destination_ref: published.hash,
            source_posted_at: post.created_at,
            created_at: self.clock.now(),
        };

        match self.store.record_crosspost(&record).await {
            Ok(()) => SyncOutcome::Crossposted {
                source_post_id: record.source_post_id,
                text: record.text,
                destination_ref: record.destination_ref,
            },
            Err(e) => {
                tracing::error!(
                    user_id = %user.id,
                    source_post_id = %record.source_post_id,
                    destination_ref = ?record.destination_ref,
                    error = %e,
                    "Cast published but sync state not recorded; the tweet will be cast again on the next run"
                );
                SyncOutcome::Unrecorded {
                    source_post_id: record.source_post_id,
                    text: record.text,
                    destination_ref: record.destination_ref,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Decide whether a fetched tweet is new for this user.
///
/// The tweet ID is the dedupe key; the timestamp check additionally rejects a
/// stale timeline that returns an older tweet under a different ID.
pub fn select_new_post(user: &User, fetched: Option<SourcePost>) -> Result<SourcePost, SkipReason> {
    let Some(post) = fetched else {
        return Err(SkipReason::NoPost);
    };

    if user.last_post_id() == Some(post.id.as_str()) {
        return Err(SkipReason::AlreadyPosted);
    }

    if let Some(last_post_at) = user.last_post_at {
        if post.created_at <= last_post_at {
            return Err(SkipReason::Stale);
        }
    }

    Ok(post)
}

/// Errors that fail a whole run
#[derive(Debug, thiserror::Error)]
pub enum CrosspostError {
    #[error("Failed to list users: {0}")]
    ListUsers(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FetchError, PublishError, PublishedCast, StoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use time::macros::datetime;

    // Fake implementations for testing
    struct FakeTweetSource {
        posts: Mutex<HashMap<String, SourcePost>>,
        failing: Vec<String>,
        hang: bool,
    }

    impl FakeTweetSource {
        fn new() -> Self {
            Self {
                posts: Mutex::new(HashMap::new()),
                failing: vec![],
                hang: false,
            }
        }

        fn with_post(self, source_user_id: &str, post: SourcePost) -> Self {
            self.set_post(source_user_id, post);
            self
        }

        fn set_post(&self, source_user_id: &str, post: SourcePost) {
            self.posts
                .lock()
                .unwrap()
                .insert(source_user_id.to_string(), post);
        }
    }

    #[async_trait]
    impl TweetSource for FakeTweetSource {
        async fn latest_post(
            &self,
            source_user_id: &str,
        ) -> Result<Option<SourcePost>, FetchError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.iter().any(|id| id == source_user_id) {
                return Err(FetchError::Network("connection reset".to_string()));
            }
            Ok(self.posts.lock().unwrap().get(source_user_id).cloned())
        }
    }

    struct FakePublisher {
        failing_signers: Vec<String>,
        published: Mutex<Vec<(String, CastDraft)>>,
    }

    impl FakePublisher {
        fn new() -> Self {
            Self {
                failing_signers: vec![],
                published: Mutex::new(vec![]),
            }
        }

        fn failing_for(signer: &str) -> Self {
            Self {
                failing_signers: vec![signer.to_string()],
                published: Mutex::new(vec![]),
            }
        }

        fn published(&self) -> Vec<(String, CastDraft)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CastPublisher for FakePublisher {
        async fn publish(
            &self,
            signer_uuid: &str,
            cast: &CastDraft,
        ) -> Result<PublishedCast, PublishError> {
            if self.failing_signers.iter().any(|s| s == signer_uuid) {
                return Err(PublishError::Api("signer not approved".to_string()));
            }
            let mut published = self.published.lock().unwrap();
            published.push((signer_uuid.to_string(), cast.clone()));
            Ok(PublishedCast {
                hash: Some(format!("0xcast{}", published.len())),
            })
        }

        fn platform(&self) -> &'static str {
            "fake"
        }
    }

    #[derive(Default)]
    struct FakeStore {
        users: Mutex<Vec<User>>,
        posts: Mutex<Vec<PostRecord>>,
        leases: Mutex<HashMap<Uuid, Uuid>>,
        fail_list: bool,
        fail_record: bool,
    }

    impl FakeStore {
        fn with_users(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users),
                ..Default::default()
            }
        }

        fn user(&self, id: Uuid) -> User {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait]
    impl SyncStore for FakeStore {
        async fn list_enabled_users(&self) -> Result<Vec<User>, StoreError> {
            if self.fail_list {
                return Err(StoreError::Database("connection refused".to_string()));
            }
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.crosspost_enabled)
                .cloned()
                .collect())
        }

        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == user_id)
                .cloned())
        }

        async fn find_user_by_signer(&self, _signer: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn find_user_by_twitter_id(&self, _id: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn save_user(&self, user: &User) -> Result<(), StoreError> {
            let mut users = self.users.lock().unwrap();
            users.retain(|u| u.id != user.id);
            users.push(user.clone());
            Ok(())
        }

        async fn set_sync_position(
            &self,
            user_id: Uuid,
            last_post_id: Option<&str>,
            last_post_at: Option<OffsetDateTime>,
        ) -> Result<(), StoreError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
            user.last_post_id = last_post_id.map(str::to_string);
            user.last_post_at = last_post_at;
            Ok(())
        }

        async fn record_crosspost(&self, record: &PostRecord) -> Result<(), StoreError> {
            if self.fail_record {
                return Err(StoreError::Database("disk I/O error".to_string()));
            }
            self.posts.lock().unwrap().push(record.clone());
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == record.user_id)
                .ok_or_else(|| StoreError::NotFound(record.user_id.to_string()))?;
            user.last_post_id = Some(record.source_post_id.clone());
            user.last_post_at = Some(record.source_posted_at);
            Ok(())
        }

        async fn recent_posts(
            &self,
            _user_id: Uuid,
            _limit: usize,
        ) -> Result<Vec<PostRecord>, StoreError> {
            Ok(vec![])
        }

        async fn acquire_lease(
            &self,
            user_id: Uuid,
            owner: Uuid,
            _now: OffsetDateTime,
            _expires_at: OffsetDateTime,
        ) -> Result<bool, StoreError> {
            let mut leases = self.leases.lock().unwrap();
            match leases.get(&user_id) {
                Some(holder) if *holder != owner => Ok(false),
                _ => {
                    leases.insert(user_id, owner);
                    Ok(true)
                }
            }
        }

        async fn release_lease(&self, user_id: Uuid, owner: Uuid) -> Result<(), StoreError> {
            let mut leases = self.leases.lock().unwrap();
            if leases.get(&user_id) == Some(&owner) {
                leases.remove(&user_id);
            }
            Ok(())
        }
    }

    struct FakeClock {
        time: OffsetDateTime,
    }

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            self.time
        }
    }

    fn user(n: u32) -> User {
        User {
            id: Uuid::new_v4(),
            twitter_user_id: format!("{}", 1000 + n),
            twitter_username: format!("user{}", n),
            farcaster_signer_uuid: format!("signer-{}", n),
            farcaster_fid: None,
            farcaster_username: None,
            crosspost_enabled: true,
            last_post_id: Some("100".to_string()),
            last_post_at: Some(datetime!(2024-01-15 12:00 UTC)),
            created_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    fn tweet(id: &str, text: &str, created_at: OffsetDateTime) -> SourcePost {
        SourcePost {
            id: id.to_string(),
            text: text.to_string(),
            created_at,
            media_urls: vec![],
        }
    }

    fn live_config() -> CrosspostConfig {
        CrosspostConfig {
            dry_run: false,
            ..Default::default()
        }
    }

    fn crossposter(
        source: Arc<FakeTweetSource>,
        publisher: Arc<FakePublisher>,
        store: Arc<FakeStore>,
        config: CrosspostConfig,
    ) -> Crossposter<FakeTweetSource, FakePublisher, FakeStore, FakeClock> {
        Crossposter::new(
            source,
            publisher,
            store,
            Arc::new(FakeClock {
                time: datetime!(2024-01-16 09:00 UTC),
            }),
            config,
        )
    }

    fn outcome_for(report: &CrosspostReport, user_id: Uuid) -> &SyncOutcome {
        &report
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .unwrap()
            .outcome
    }

    #[tokio::test]
    async fn test_new_tweet_is_cast_and_recorded() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &alice.twitter_user_id,
            SourcePost {
                media_urls: vec!["https://pbs.twimg.com/media/a.jpg".to_string()],
                ..tweet(
                    "101",
                    "New thing https://t.co/perma",
                    datetime!(2024-01-16 08:00 UTC),
                )
            },
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        let report = crossposter(source, publisher.clone(), store.clone(), live_config())
            .run_once()
            .await
            .unwrap();

        assert_eq!(
            outcome_for(&report, alice.id),
            &SyncOutcome::Crossposted {
                source_post_id: "101".to_string(),
                text: "New thing".to_string(),
                destination_ref: Some("0xcast1".to_string()),
            }
        );

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "signer-1");
        assert_eq!(
            published[0].1.embeds,
            vec!["https://pbs.twimg.com/media/a.jpg"]
        );

        let stored = store.user(alice.id);
        assert_eq!(stored.last_post_id.as_deref(), Some("101"));
        assert_eq!(stored.last_post_at, Some(datetime!(2024-01-16 08:00 UTC)));

        let posts = store.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].destination_ref.as_deref(), Some("0xcast1"));
    }

    #[tokio::test]
    async fn test_second_run_without_new_tweet_is_noop() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &alice.twitter_user_id,
            tweet("101", "hello", datetime!(2024-01-16 08:00 UTC)),
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));
        let crossposter = crossposter(source, publisher.clone(), store, live_config());

        crossposter.run_once().await.unwrap();
        let second = crossposter.run_once().await.unwrap();

        assert_eq!(publisher.published().len(), 1);
        assert_eq!(
            outcome_for(&second, alice.id),
            &SyncOutcome::Skipped {
                reason: SkipReason::AlreadyPosted
            }
        );
        assert!(second.results().is_empty());
    }

    #[tokio::test]
    async fn test_stale_tweet_with_new_id_is_not_cast() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &alice.twitter_user_id,
            // Same instant as the stored timestamp: not strictly newer
            tweet("099", "old news", datetime!(2024-01-15 12:00 UTC)),
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        let report = crossposter(source, publisher.clone(), store, live_config())
            .run_once()
            .await
            .unwrap();

        assert!(publisher.published().is_empty());
        assert_eq!(
            outcome_for(&report, alice.id),
            &SyncOutcome::Skipped {
                reason: SkipReason::Stale
            }
        );
    }

    #[tokio::test]
    async fn test_no_tweet_and_empty_text_are_skipped() {
        let alice = user(1);
        let bob = user(2);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &bob.twitter_user_id,
            tweet("201", "https://t.co/only-a-link", datetime!(2024-01-16 08:00 UTC)),
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore::with_users(vec![alice.clone(), bob.clone()]));

        let report = crossposter(source, publisher.clone(), store, live_config())
            .run_once()
            .await
            .unwrap();

        assert!(publisher.published().is_empty());
        assert_eq!(
            outcome_for(&report, alice.id),
            &SyncOutcome::Skipped {
                reason: SkipReason::NoPost
            }
        );
        assert_eq!(
            outcome_for(&report, bob.id),
            &SyncOutcome::Skipped {
                reason: SkipReason::EmptyText
            }
        );
    }

    #[tokio::test]
    async fn test_publish_failure_is_isolated() {
        let users = vec![user(1), user(2), user(3)];
        let source = FakeTweetSource::new();
        for (i, u) in users.iter().enumerate() {
            source.set_post(
                &u.twitter_user_id,
                tweet(&format!("50{}", i), "gm", datetime!(2024-01-16 08:00 UTC)),
            );
        }
        let publisher = Arc::new(FakePublisher::failing_for("signer-2"));
        let store = Arc::new(FakeStore::with_users(users.clone()));

        let report = crossposter(
            Arc::new(source),
            publisher.clone(),
            store.clone(),
            live_config(),
        )
        .run_once()
        .await
        .unwrap();

        assert_eq!(report.users.len(), 3);
        assert_eq!(report.crossposted(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            outcome_for(&report, users[0].id),
            SyncOutcome::Crossposted { .. }
        ));
        assert!(matches!(
            outcome_for(&report, users[2].id),
            SyncOutcome::Crossposted { .. }
        ));
        match outcome_for(&report, users[1].id) {
            SyncOutcome::Failed {
                source_post_id,
                error,
                ..
            } => {
                assert_eq!(source_post_id.as_deref(), Some("501"));
                assert!(error.contains("signer not approved"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        // Failed user keeps its old state so the tweet is retried next run
        assert_eq!(store.user(users[1].id).last_post_id.as_deref(), Some("100"));

        let results = report.results();
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.error.is_some()).count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_quiet_skip() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource {
            failing: vec![alice.twitter_user_id.clone()],
            ..FakeTweetSource::new()
        });
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        let report = crossposter(source, Arc::new(FakePublisher::new()), store, live_config())
            .run_once()
            .await
            .unwrap();

        assert!(matches!(
            outcome_for(&report, alice.id),
            SyncOutcome::Skipped {
                reason: SkipReason::FetchFailed(_)
            }
        ));
        assert!(report.results().is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_fails_the_run() {
        let store = Arc::new(FakeStore {
            fail_list: true,
            ..Default::default()
        });

        let result = crossposter(
            Arc::new(FakeTweetSource::new()),
            Arc::new(FakePublisher::new()),
            store,
            live_config(),
        )
        .run_once()
        .await;

        assert!(matches!(result, Err(CrosspostError::ListUsers(_))));
    }

    #[tokio::test]
    async fn test_persist_failure_reports_unrecorded() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &alice.twitter_user_id,
            tweet("101", "hello", datetime!(2024-01-16 08:00 UTC)),
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore {
            fail_record: true,
            ..FakeStore::with_users(vec![alice.clone()])
        });

        let report = crossposter(source, publisher.clone(), store, live_config())
            .run_once()
            .await
            .unwrap();

        assert_eq!(publisher.published().len(), 1);
        assert!(matches!(
            outcome_for(&report, alice.id),
            SyncOutcome::Unrecorded { .. }
        ));
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn test_held_lease_skips_user() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &alice.twitter_user_id,
            tweet("101", "hello", datetime!(2024-01-16 08:00 UTC)),
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));
        store
            .leases
            .lock()
            .unwrap()
            .insert(alice.id, Uuid::new_v4());

        let report = crossposter(source, publisher.clone(), store, live_config())
            .run_once()
            .await
            .unwrap();

        assert!(publisher.published().is_empty());
        assert_eq!(
            outcome_for(&report, alice.id),
            &SyncOutcome::Skipped {
                reason: SkipReason::LeaseHeld
            }
        );
    }

    #[tokio::test]
    async fn test_lease_is_released_after_sync() {
        let alice = user(1);
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        crossposter(
            Arc::new(FakeTweetSource::new()),
            Arc::new(FakePublisher::new()),
            store.clone(),
            live_config(),
        )
        .run_once()
        .await
        .unwrap();

        assert!(store.leases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_publish_or_persist() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource::new().with_post(
            &alice.twitter_user_id,
            tweet("101", "hello", datetime!(2024-01-16 08:00 UTC)),
        ));
        let publisher = Arc::new(FakePublisher::new());
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        let report = crossposter(
            source,
            publisher.clone(),
            store.clone(),
            CrosspostConfig::default(),
        )
        .run_once()
        .await
        .unwrap();

        assert!(publisher.published().is_empty());
        assert!(matches!(
            outcome_for(&report, alice.id),
            SyncOutcome::DryRun { .. }
        ));
        assert_eq!(store.user(alice.id).last_post_id.as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn test_disconnected_user_is_skipped() {
        let mut alice = user(1);
        alice.farcaster_signer_uuid.clear();
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        let report = crossposter(
            Arc::new(FakeTweetSource::new()),
            Arc::new(FakePublisher::new()),
            store,
            live_config(),
        )
        .run_once()
        .await
        .unwrap();

        assert_eq!(
            outcome_for(&report, alice.id),
            &SyncOutcome::Skipped {
                reason: SkipReason::NotConnected
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let alice = user(1);
        let source = Arc::new(FakeTweetSource {
            hang: true,
            ..FakeTweetSource::new()
        });
        let store = Arc::new(FakeStore::with_users(vec![alice.clone()]));

        let config = CrosspostConfig {
            call_timeout: Duration::from_secs(5),
            ..live_config()
        };

        let report = crossposter(source, Arc::new(FakePublisher::new()), store, config)
            .run_once()
            .await
            .unwrap();

        match outcome_for(&report, alice.id) {
            SyncOutcome::Failed { error, .. } => assert!(error.contains("timed out")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_select_new_post_without_stored_state() {
        let mut fresh = user(1);
        fresh.last_post_id = None;
        fresh.last_post_at = None;

        let post = tweet("1", "first", datetime!(2020-01-01 00:00 UTC));
        assert_eq!(select_new_post(&fresh, Some(post.clone())), Ok(post));
        assert_eq!(select_new_post(&fresh, None), Err(SkipReason::NoPost));
    }

    #[test]
    fn test_identical_text_with_new_id_is_new() {
        let alice = user(1);
        let repeat = tweet("102", "same words", datetime!(2024-01-16 00:00 UTC));
        assert!(select_new_post(&alice, Some(repeat)).is_ok());
    }
}
