//! Farcaster publishing through Neynar

mod write;

pub use write::{
    DEFAULT_MAX_CAST_BYTES, DEFAULT_NEYNAR_URL, NeynarCastPublisher, SignerState, SignerStatus,
};

use async_trait::async_trait;
use crosscast_domain::{CastDraft, CastPublisher, PublishError, PublishedCast};

/// A cast accepted by [`StubCastPublisher`]
#[derive(Debug, Clone, PartialEq)]
pub struct StubCast {
    pub signer_uuid: String,
    pub cast: CastDraft,
}

/// Stub cast publisher for testing
pub struct StubCastPublisher {
    enabled: bool,
    published: std::sync::Mutex<Vec<StubCast>>,
}

impl StubCastPublisher {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            published: std::sync::Mutex::new(vec![]),
        }
    }

    /// Get all casts that were published
    pub fn get_published(&self) -> Vec<StubCast> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl CastPublisher for StubCastPublisher {
    async fn publish(
        &self,
        signer_uuid: &str,
        cast: &CastDraft,
    ) -> Result<PublishedCast, PublishError> {
        if !self.enabled {
            return Err(PublishError::Api("Publisher disabled".to_string()));
        }

        self.published.lock().unwrap().push(StubCast {
            signer_uuid: signer_uuid.to_string(),
            cast: cast.clone(),
        });

        Ok(PublishedCast {
            hash: Some(format!("0xstub{}", cast.source_post_id)),
        })
    }

    fn platform(&self) -> &'static str {
        "farcaster"
    }
}
