//! Twitter timeline adapters

mod read;

pub use read::{DEFAULT_RAPIDAPI_HOST, RapidApiTweetSource};

use async_trait::async_trait;
use crosscast_domain::{FetchError, SourcePost, TweetSource};
use std::collections::HashMap;

/// Stub tweet source for testing
pub struct StubTweetSource {
    posts: HashMap<String, SourcePost>,
}

impl StubTweetSource {
    /// Create a stub whose timelines are all empty
    pub fn empty() -> Self {
        Self {
            posts: HashMap::new(),
        }
    }

    /// Create a stub with a predefined latest tweet per source user ID
    pub fn with_posts(posts: impl IntoIterator<Item = (String, SourcePost)>) -> Self {
        Self {
            posts: posts.into_iter().collect(),
        }
    }
}

#[async_trait]
impl TweetSource for StubTweetSource {
    async fn latest_post(&self, source_user_id: &str) -> Result<Option<SourcePost>, FetchError> {
        Ok(self.posts.get(source_user_id).cloned())
    }
}
