//! Timeline read adapter for fetching a user's latest tweet

use async_trait::async_trait;
use crosscast_domain::{FetchError, SourcePost, TweetSource, is_valid_source_user_id};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use time::OffsetDateTime;

pub const DEFAULT_RAPIDAPI_HOST: &str = "twitter241.p.rapidapi.com";

/// Legacy `created_at` format, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const LEGACY_DATE_FORMAT: &str = "[weekday repr:short] [month repr:short] [day] \
    [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]";

const ADD_ENTRIES: &str = "TimelineAddEntries";

/// RapidAPI timeline source for reading a user's latest tweet
pub struct RapidApiTweetSource {
    client: Client,
    api_key: SecretString,
    host: String,
    base_url: String,
}

impl RapidApiTweetSource {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(
            api_key,
            DEFAULT_RAPIDAPI_HOST.to_string(),
            format!("https://{}", DEFAULT_RAPIDAPI_HOST),
            Duration::from_secs(30),
        )
    }

    pub fn with_base_url(
        api_key: SecretString,
        host: String,
        base_url: String,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            host,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_timeline(&self, user_id: &str) -> Result<TimelineResponse, FetchError> {
        let url = format!("{}/user-tweets", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("user", user_id), ("count", "1")])
            .header("x-rapidapi-host", &self.host)
            .header("x-rapidapi-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(FetchError::Auth("Invalid RapidAPI key".to_string()));
        }

        if status == 429 {
            let retry_after = response
                .headers()
                .get("x-ratelimit-requests-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(format!(
                "Failed to get tweets ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct TimelineResponse {
    result: TimelineResult,
}

#[derive(Deserialize)]
struct TimelineResult {
    timeline: Timeline,
}

#[derive(Deserialize)]
struct Timeline {
    /// Kept raw so a single odd instruction cannot fail the whole timeline
    instructions: Vec<Value>,
}

#[derive(Deserialize)]
struct Instruction {
    #[serde(rename = "type")]
    kind: String,
    entries: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(rename = "entryId")]
    entry_id: Option<String>,
    content: Option<EntryContent>,
}

#[derive(Deserialize)]
struct EntryContent {
    #[serde(rename = "itemContent")]
    item_content: Option<ItemContent>,
}

#[derive(Deserialize)]
struct ItemContent {
    tweet_results: Option<TweetResults>,
    #[serde(rename = "promotedMetadata")]
    promoted_metadata: Option<Value>,
}

#[derive(Deserialize)]
struct TweetResults {
    result: Option<TweetResult>,
}

#[derive(Deserialize)]
struct TweetResult {
    rest_id: Option<String>,
    legacy: Option<Legacy>,
    /// Set on `TweetWithVisibilityResults` wrappers
    tweet: Option<Box<TweetResult>>,
}

#[derive(Deserialize)]
struct Legacy {
    full_text: Option<String>,
    created_at: Option<String>,
    entities: Option<Entities>,
    extended_entities: Option<Entities>,
}

#[derive(Deserialize)]
struct Entities {
    media: Option<Vec<Media>>,
}

#[derive(Deserialize)]
struct Media {
    media_url_https: Option<String>,
}

impl Entry {
    fn into_source_post(self, fetched_at: OffsetDateTime) -> Option<SourcePost> {
        if self
            .entry_id
            .as_deref()
            .is_some_and(|id| id.starts_with("promoted-"))
        {
            return None;
        }

        let item = self.content?.item_content?;
        if item.promoted_metadata.is_some() {
            return None;
        }

        let mut result = item.tweet_results?.result?;
        while result.rest_id.is_none() {
            result = *result.tweet?;
        }

        let id = result.rest_id.filter(|id| !id.is_empty())?;
        let legacy = result.legacy?;
        let Some(text) = legacy.full_text.filter(|t| !t.trim().is_empty()) else {
            tracing::debug!(tweet_id = %id, "Skipping tweet without text");
            return None;
        };

        let created_at = match legacy.created_at.as_deref().map(parse_legacy_date) {
            Some(Ok(created_at)) => created_at,
            Some(Err(error)) => {
                tracing::warn!(tweet_id = %id, error = %error, "Unparseable created_at, using fetch time");
                fetched_at
            }
            None => fetched_at,
        };

        let media = legacy
            .extended_entities
            .and_then(|e| e.media)
            .filter(|m| !m.is_empty())
            .or_else(|| legacy.entities.and_then(|e| e.media))
            .unwrap_or_default();

        let mut media_urls: Vec<String> = Vec::with_capacity(media.len());
        for url in media.into_iter().filter_map(|m| m.media_url_https) {
            if !media_urls.contains(&url) {
                media_urls.push(url);
            }
        }

        Some(SourcePost {
            id,
            text,
            created_at,
            media_urls,
        })
    }
}

fn parse_legacy_date(value: &str) -> Result<OffsetDateTime, String> {
    let format = time::format_description::parse(LEGACY_DATE_FORMAT).map_err(|e| e.to_string())?;
    OffsetDateTime::parse(value, &format).map_err(|e| e.to_string())
}

/// First tweet of the first `TimelineAddEntries` instruction that has one
fn latest_from_timeline(timeline: Timeline, fetched_at: OffsetDateTime) -> Option<SourcePost> {
    for raw in timeline.instructions {
        let Ok(instruction) = serde_json::from_value::<Instruction>(raw) else {
            tracing::debug!("Skipping malformed timeline instruction");
            continue;
        };

        if instruction.kind != ADD_ENTRIES {
            continue;
        }

        for raw_entry in instruction.entries.unwrap_or_default() {
            let Ok(entry) = serde_json::from_value::<Entry>(raw_entry) else {
                continue;
            };
            if let Some(post) = entry.into_source_post(fetched_at) {
                return Some(post);
            }
        }
    }

    None
}

#[async_trait]
impl TweetSource for RapidApiTweetSource {
    async fn latest_post(&self, source_user_id: &str) -> Result<Option<SourcePost>, FetchError> {
        if !is_valid_source_user_id(source_user_id) {
            return Err(FetchError::InvalidUser(source_user_id.to_string()));
        }

        tracing::debug!(source_user_id = %source_user_id, "Fetching latest tweet");

        let response = self.fetch_timeline(source_user_id).await?;
        let post = latest_from_timeline(response.result.timeline, OffsetDateTime::now_utc());

        tracing::debug!(
            source_user_id = %source_user_id,
            tweet_id = ?post.as_ref().map(|p| &p.id),
            "Fetched latest tweet"
        );

        Ok(post)
    }
}
