//! Outbox publisher for review mode: casts are appended to a JSONL file instead of sent.

use async_trait::async_trait;
use crosscast_domain::{CastDraft, CastPublisher, PublishError, PublishedCast};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct OutboxWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(path: PathBuf) -> Result<Self, OutboxError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &OutboxEntry<'_>) -> Result<(), OutboxError> {
        let line = serde_json::to_string(entry)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

/// Publisher that records casts for later review
#[derive(Debug, Clone)]
pub struct OutboxCastPublisher {
    writer: OutboxWriter,
}

impl OutboxCastPublisher {
    pub fn new(writer: OutboxWriter) -> Self {
        Self { writer }
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    id: &'a str,
    signer_uuid: &'a str,
    source_post_id: &'a str,
    text: &'a str,
    embeds: &'a [String],
    #[serde(with = "time::serde::rfc3339")]
    queued_at: OffsetDateTime,
}

#[async_trait]
impl CastPublisher for OutboxCastPublisher {
    async fn publish(
        &self,
        signer_uuid: &str,
        cast: &CastDraft,
    ) -> Result<PublishedCast, PublishError> {
        let id = Uuid::new_v4().to_string();
        let entry = OutboxEntry {
            id: &id,
            signer_uuid,
            source_post_id: &cast.source_post_id,
            text: &cast.text,
            embeds: &cast.embeds,
            queued_at: OffsetDateTime::now_utc(),
        };

        self.writer
            .append(&entry)
            .await
            .map_err(|error| PublishError::Api(format!("Outbox write failed: {}", error)))?;

        Ok(PublishedCast { hash: Some(id) })
    }

    fn platform(&self) -> &'static str {
        "outbox"
    }
}
