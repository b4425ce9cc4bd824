//! Neynar API write adapter for publishing casts

use async_trait::async_trait;
use crosscast_domain::{CastDraft, CastPublisher, PublishError, PublishedCast};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_NEYNAR_URL: &str = "https://api.neynar.com";

/// Farcaster cast limit in bytes
pub const DEFAULT_MAX_CAST_BYTES: usize = 320;

/// Farcaster accepts at most two embeds per cast
const MAX_EMBEDS: usize = 2;

/// Neynar publisher for creating casts with managed signers
pub struct NeynarCastPublisher {
    client: Client,
    api_key: SecretString,
    base_url: String,
    max_cast_bytes: usize,
}

impl NeynarCastPublisher {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(
            api_key,
            DEFAULT_NEYNAR_URL.to_string(),
            DEFAULT_MAX_CAST_BYTES,
            Duration::from_secs(30),
        )
    }

    pub fn with_base_url(
        api_key: SecretString,
        base_url: String,
        max_cast_bytes: usize,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_cast_bytes,
        }
    }
}

#[derive(Serialize)]
struct CreateCastRequest<'a> {
    signer_uuid: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed<'a>>,
}

#[derive(Serialize)]
struct Embed<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct CreateCastResponse {
    cast: Option<CastData>,
}

#[derive(Deserialize)]
struct CastData {
    hash: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Neynar's `message` field when the body carries one, the raw body otherwise
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Approval state of a managed signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerState {
    Generated,
    PendingApproval,
    Approved,
    Revoked,
    #[serde(other)]
    Unknown,
}

impl SignerState {
    /// Only approved signers can publish
    pub fn can_publish(self) -> bool {
        self == SignerState::Approved
    }
}

/// Result of a signer lookup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignerStatus {
    pub status: SignerState,
    pub fid: Option<u64>,
}

impl NeynarCastPublisher {
    /// Look up whether a signer is approved to cast for its account
    pub async fn signer_status(&self, signer_uuid: &str) -> Result<SignerStatus, PublishError> {
        let url = format!("{}/v2/farcaster/signer", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("signer_uuid", signer_uuid)])
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(PublishError::Auth("Invalid Neynar API key".to_string()));
        }

        if status == 429 {
            return Err(PublishError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "Failed to look up signer ({}): {}",
                status,
                error_message(&body)
            )));
        }

        response
            .json::<SignerStatus>()
            .await
            .map_err(|e| PublishError::Api(format!("Unreadable signer response: {}", e)))
    }
}

#[async_trait]
impl CastPublisher for NeynarCastPublisher {
    async fn publish(
        &self,
        signer_uuid: &str,
        cast: &CastDraft,
    ) -> Result<PublishedCast, PublishError> {
        if cast.text.len() > self.max_cast_bytes {
            // Stays unpublished until a newer tweet supersedes it
            tracing::warn!(
                source_post_id = %cast.source_post_id,
                bytes = cast.text.len(),
                max = self.max_cast_bytes,
                "Cast exceeds the byte limit; not publishing"
            );
            return Err(PublishError::ContentTooLong {
                len: cast.text.len(),
                max: self.max_cast_bytes,
            });
        }

        if cast.embeds.len() > MAX_EMBEDS {
            tracing::debug!(
                source_post_id = %cast.source_post_id,
                embeds = cast.embeds.len(),
                "Dropping embeds beyond the cast limit"
            );
        }

        let request = CreateCastRequest {
            signer_uuid,
            text: &cast.text,
            embeds: cast
                .embeds
                .iter()
                .take(MAX_EMBEDS)
                .map(|url| Embed { url })
                .collect(),
        };

        let url = format!("{}/v2/farcaster/cast", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(PublishError::Auth("Invalid Neynar API key or signer".to_string()));
        }

        if status == 429 {
            return Err(PublishError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "Failed to publish cast ({}): {}",
                status,
                error_message(&body)
            )));
        }

        // A 2xx means the cast exists; a body we cannot read only loses the hash
        let hash = match response.json::<CreateCastResponse>().await {
            Ok(body) => body.cast.and_then(|c| c.hash),
            Err(error) => {
                tracing::warn!(error = %error, "Cast published but response was unreadable");
                None
            }
        };

        Ok(PublishedCast { hash })
    }

    fn platform(&self) -> &'static str {
        "farcaster"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_cast() -> CastDraft {
        CastDraft {
            text: "Hello world".to_string(),
            embeds: vec![],
            source_post_id: "1921834759899975938".to_string(),
        }
    }

    fn publisher(server: &MockServer) -> NeynarCastPublisher {
        NeynarCastPublisher::with_base_url(
            SecretString::new("test-key".into()),
            server.uri(),
            DEFAULT_MAX_CAST_BYTES,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_publish_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .and(header("x-api-key", "test-key"))
            .and(body_json(serde_json::json!({
                "signer_uuid": "signer-1",
                "text": "Hello world"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "cast": { "hash": "0xabc123", "author": { "fid": 3 } }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = publisher(&mock_server)
            .publish("signer-1", &sample_cast())
            .await
            .unwrap();

        assert_eq!(result.hash.as_deref(), Some("0xabc123"));
    }

    #[tokio::test]
    async fn test_publish_caps_embeds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .and(body_json(serde_json::json!({
                "signer_uuid": "signer-1",
                "text": "Three photos",
                "embeds": [
                    { "url": "https://pbs.twimg.com/media/a.jpg" },
                    { "url": "https://pbs.twimg.com/media/b.jpg" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cast": { "hash": "0xdef" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cast = CastDraft {
            text: "Three photos".to_string(),
            embeds: vec![
                "https://pbs.twimg.com/media/a.jpg".to_string(),
                "https://pbs.twimg.com/media/b.jpg".to_string(),
                "https://pbs.twimg.com/media/c.jpg".to_string(),
            ],
            source_post_id: "1".to_string(),
        };

        let result = publisher(&mock_server).publish("signer-1", &cast).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_success_without_hash() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let result = publisher(&mock_server)
            .publish("signer-1", &sample_cast())
            .await
            .unwrap();

        assert_eq!(result.hash, None);
    }

    #[tokio::test]
    async fn test_publish_content_too_long() {
        let publisher = NeynarCastPublisher::with_base_url(
            SecretString::new("test-key".into()),
            "http://127.0.0.1:9".to_string(),
            5,
            Duration::from_secs(5),
        );

        let result = publisher.publish("signer-1", &sample_cast()).await;

        assert!(matches!(
            result,
            Err(PublishError::ContentTooLong { len: 11, max: 5 })
        ));
    }

    #[tokio::test]
    async fn test_publish_over_limit_never_calls_api() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        // 321 bytes in 107 characters
        let cast = CastDraft {
            text: "€".repeat(107),
            ..sample_cast()
        };
        let publisher = publisher(&mock_server);

        for _ in 0..2 {
            let result = publisher.publish("signer-1", &cast).await;
            assert!(matches!(
                result,
                Err(PublishError::ContentTooLong { len: 321, max: 320 })
            ));
        }
    }

    #[tokio::test]
    async fn test_publish_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let result = publisher(&mock_server)
            .publish("signer-1", &sample_cast())
            .await;

        assert!(matches!(result, Err(PublishError::RateLimited)));
    }

    #[tokio::test]
    async fn test_publish_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .and(header("x-api-key", "other-key"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("signer not approved"),
            )
            .mount(&mock_server)
            .await;

        let auth = publisher(&mock_server)
            .publish("signer-1", &sample_cast())
            .await;
        assert!(matches!(auth, Err(PublishError::Auth(_))));

        let other_key = NeynarCastPublisher::with_base_url(
            SecretString::new("other-key".into()),
            mock_server.uri(),
            DEFAULT_MAX_CAST_BYTES,
            Duration::from_secs(5),
        );
        let api = other_key.publish("signer-1", &sample_cast()).await;
        assert!(matches!(api, Err(PublishError::Api(m)) if m.contains("signer not approved")));
    }

    #[tokio::test]
    async fn test_publish_error_uses_api_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/farcaster/cast"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "InvalidField",
                "message": "Text is too long",
                "property": "text"
            })))
            .mount(&mock_server)
            .await;

        let result = publisher(&mock_server)
            .publish("signer-1", &sample_cast())
            .await;

        let Err(PublishError::Api(message)) = result else {
            panic!("expected an API error, got {:?}", result);
        };
        assert_eq!(message, "Failed to publish cast (400 Bad Request): Text is too long");
    }

    #[tokio::test]
    async fn test_signer_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/farcaster/signer"))
            .and(query_param("signer_uuid", "signer-1"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signer_uuid": "signer-1",
                "public_key": "0x8f2b",
                "status": "approved",
                "fid": 1234
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/farcaster/signer"))
            .and(query_param("signer_uuid", "signer-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signer_uuid": "signer-2",
                "status": "pending_approval"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/farcaster/signer"))
            .and(query_param("signer_uuid", "missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "Signer not found"
            })))
            .mount(&mock_server)
            .await;

        let publisher = publisher(&mock_server);

        let approved = publisher.signer_status("signer-1").await.unwrap();
        assert_eq!(approved.status, SignerState::Approved);
        assert_eq!(approved.fid, Some(1234));
        assert!(approved.status.can_publish());

        let pending = publisher.signer_status("signer-2").await.unwrap();
        assert_eq!(pending.status, SignerState::PendingApproval);
        assert_eq!(pending.fid, None);
        assert!(!pending.status.can_publish());

        let missing = publisher.signer_status("missing").await;
        assert!(matches!(missing, Err(PublishError::Api(m)) if m.contains("Signer not found")));
    }
}
