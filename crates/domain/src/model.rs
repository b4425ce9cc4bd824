//! Domain models and value objects

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A user whose tweets are mirrored to Farcaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,
    /// Numeric Twitter user ID (empty when disconnected)
    pub twitter_user_id: String,
    /// Twitter handle, without the leading `@`
    pub twitter_username: String,
    /// Neynar signer UUID used to cast on the user's behalf (empty when disconnected)
    pub farcaster_signer_uuid: String,
    /// Farcaster ID, if known
    pub farcaster_fid: Option<u64>,
    /// Farcaster username, if known
    pub farcaster_username: Option<String>,
    /// Whether the user opted in to cross-posting
    pub crosspost_enabled: bool,
    /// ID of the last tweet that was cross-posted (or seen as a baseline)
    pub last_post_id: Option<String>,
    /// Creation time of that tweet
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_post_at: Option<OffsetDateTime>,
    /// When the user was registered
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn has_twitter(&self) -> bool {
        !self.twitter_user_id.trim().is_empty()
    }

    pub fn has_farcaster(&self) -> bool {
        !self.farcaster_signer_uuid.trim().is_empty()
    }

    /// Both platforms connected, so a sync can run
    pub fn is_connected(&self) -> bool {
        self.has_twitter() && self.has_farcaster()
    }

    /// Last cross-posted tweet ID; an empty string counts as none
    pub fn last_post_id(&self) -> Option<&str> {
        self.last_post_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Name used in logs and trigger results
    pub fn handle(&self) -> &str {
        if self.twitter_username.is_empty() {
            &self.twitter_user_id
        } else {
            &self.twitter_username
        }
    }
}

/// Twitter user IDs are decimal strings; handles are not accepted
pub fn is_valid_source_user_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// The latest tweet fetched for a user. Never persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePost {
    /// Tweet ID (`rest_id`)
    pub id: String,
    /// Raw tweet text (`full_text`)
    pub text: String,
    /// When the tweet was created
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Attached media URLs, in timeline order
    pub media_urls: Vec<String>,
}

/// A cast ready to be published
#[derive(Debug, Clone, PartialEq)]
pub struct CastDraft {
    /// Normalized cast text
    pub text: String,
    /// URLs to embed in the cast
    pub embeds: Vec<String>,
    /// Tweet the cast mirrors
    pub source_post_id: String,
}

/// Append-only record of one cross-post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Unique record ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Mirrored tweet ID
    pub source_post_id: String,
    /// Normalized text that was cast
    pub text: String,
    /// Cast hash; `None` when the publish was accepted without a hash
    pub destination_ref: Option<String>,
    /// Creation time of the mirrored tweet
    #[serde(with = "time::serde::rfc3339")]
    pub source_posted_at: OffsetDateTime,
    /// When the record was written
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Why a user was skipped in a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Twitter or Farcaster is not connected
    NotConnected,
    /// Another run holds the user's sync lease
    LeaseHeld,
    /// The fetch failed; treated as nothing new
    FetchFailed(String),
    /// The timeline had no usable tweet
    NoPost,
    /// The latest tweet was already cross-posted
    AlreadyPosted,
    /// The latest tweet is not newer than the last cross-posted one
    Stale,
    /// The tweet text normalized to nothing
    EmptyText,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotConnected => write!(f, "accounts not connected"),
            SkipReason::LeaseHeld => write!(f, "sync already in progress"),
            SkipReason::FetchFailed(error) => write!(f, "fetch failed: {}", error),
            SkipReason::NoPost => write!(f, "no tweet found"),
            SkipReason::AlreadyPosted => write!(f, "latest tweet already cross-posted"),
            SkipReason::Stale => write!(f, "latest tweet is not newer than the last one"),
            SkipReason::EmptyText => write!(f, "tweet text is empty after normalization"),
        }
    }
}

/// Result of one user's pipeline within a sync run
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Published and recorded
    Crossposted {
        source_post_id: String,
        text: String,
        destination_ref: Option<String>,
    },
    /// Published, but the store update failed; the tweet may be cast again
    Unrecorded {
        source_post_id: String,
        text: String,
        destination_ref: Option<String>,
        error: String,
    },
    /// Would have been published (dry run)
    DryRun { source_post_id: String, text: String },
    /// Nothing to do for this user
    Skipped { reason: SkipReason },
    /// Publishing (or a bounded call) failed; state is untouched
    Failed {
        source_post_id: Option<String>,
        text: Option<String>,
        error: String,
    },
}

/// A user's outcome in a sync run
#[derive(Debug, Clone)]
pub struct UserSync {
    pub user_id: Uuid,
    pub handle: String,
    pub outcome: SyncOutcome,
}

/// Per-user entry of the trigger response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrosspostResult {
    pub handle: String,
    pub source_post_id: String,
    pub text: String,
    pub destination_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrosspostResult {
    /// Convert a user's outcome into a trigger result. Skipped users produce none.
    pub fn from_sync(sync: &UserSync) -> Option<Self> {
        let handle = sync.handle.clone();
        match &sync.outcome {
            SyncOutcome::Crossposted {
                source_post_id,
                text,
                destination_ref,
            } => Some(Self {
                handle,
                source_post_id: source_post_id.clone(),
                text: text.clone(),
                destination_ref: destination_ref.clone(),
                error: None,
            }),
            SyncOutcome::Unrecorded {
                source_post_id,
                text,
                destination_ref,
                error,
            } => Some(Self {
                handle,
                source_post_id: source_post_id.clone(),
                text: text.clone(),
                destination_ref: destination_ref.clone(),
                error: Some(format!("cast published but not recorded: {}", error)),
            }),
            SyncOutcome::DryRun {
                source_post_id,
                text,
            } => Some(Self {
                handle,
                source_post_id: source_post_id.clone(),
                text: text.clone(),
                destination_ref: None,
                error: None,
            }),
            SyncOutcome::Failed {
                source_post_id,
                text,
                error,
            } => Some(Self {
                handle,
                source_post_id: source_post_id.clone().unwrap_or_default(),
                text: text.clone().unwrap_or_default(),
                destination_ref: None,
                error: Some(error.clone()),
            }),
            SyncOutcome::Skipped { .. } => None,
        }
    }
}
