//! SQLite sync store implementation

use async_trait::async_trait;
use crosscast_domain::{PostRecord, StoreError, SyncStore, User};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// SQLite-backed sync store
pub struct SqliteSyncStore {
    pool: SqlitePool,
}

type UserRow = (
    String,
    String,
    String,
    String,
    Option<i64>,
    Option<String>,
    bool,
    Option<String>,
    Option<String>,
    String,
);

type PostRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

const USER_COLUMNS: &str = "id, twitter_user_id, twitter_username, farcaster_signer_uuid, \
    farcaster_fid, farcaster_username, crosspost_enabled, last_post_id, last_post_at, created_at";

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn format_ts(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.format(&Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_ts(value: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_id(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (
        id,
        twitter_user_id,
        twitter_username,
        farcaster_signer_uuid,
        farcaster_fid,
        farcaster_username,
        crosspost_enabled,
        last_post_id,
        last_post_at,
        created_at,
    ) = row;

    Ok(User {
        id: parse_id(&id)?,
        twitter_user_id,
        twitter_username,
        farcaster_signer_uuid,
        farcaster_fid: farcaster_fid
            .map(|fid| {
                u64::try_from(fid).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()?,
        farcaster_username,
        crosspost_enabled,
        last_post_id,
        last_post_at: last_post_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at)?,
    })
}

fn post_from_row(row: PostRow) -> Result<PostRecord, StoreError> {
    let (id, user_id, source_post_id, text, destination_ref, source_posted_at, created_at) = row;

    Ok(PostRecord {
        id: parse_id(&id)?,
        user_id: parse_id(&user_id)?,
        source_post_id,
        text,
        destination_ref,
        source_posted_at: parse_ts(&source_posted_at)?,
        created_at: parse_ts(&created_at)?,
    })
}

impl SqliteSyncStore {
    /// Create a new SQLite sync store, initializing the database if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                twitter_user_id TEXT NOT NULL,
                twitter_username TEXT NOT NULL,
                farcaster_signer_uuid TEXT NOT NULL,
                farcaster_fid INTEGER,
                farcaster_username TEXT,
                crosspost_enabled INTEGER NOT NULL DEFAULT 0,
                last_post_id TEXT,
                last_post_at TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                source_post_id TEXT NOT NULL,
                text TEXT NOT NULL,
                destination_ref TEXT,
                source_posted_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_signer ON users(farcaster_signer_uuid)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        // Lease expiry is stored as unix seconds so it compares numerically
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_leases (
                user_id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn query_users(&self, filter: &str, bind: Option<&str>) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users {} ORDER BY rowid", USER_COLUMNS, filter);
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(user_from_row).collect()
    }
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn list_enabled_users(&self) -> Result<Vec<User>, StoreError> {
        self.query_users("WHERE crosspost_enabled = 1", None).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.query_users("", None).await
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let id = user_id.to_string();
        Ok(self
            .query_users("WHERE id = ?", Some(&id))
            .await?
            .into_iter()
            .next())
    }

    async fn find_user_by_signer(&self, signer_uuid: &str) -> Result<Option<User>, StoreError> {
        if signer_uuid.is_empty() {
            return Ok(None);
        }
        Ok(self
            .query_users("WHERE farcaster_signer_uuid = ?", Some(signer_uuid))
            .await?
            .into_iter()
            .next())
    }

    async fn find_user_by_twitter_id(
        &self,
        twitter_user_id: &str,
    ) -> Result<Option<User>, StoreError> {
        if twitter_user_id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .query_users("WHERE twitter_user_id = ?", Some(twitter_user_id))
            .await?
            .into_iter()
            .next())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let last_post_at = user.last_post_at.map(format_ts).transpose()?;
        let created_at = format_ts(user.created_at)?;
        let fid = user
            .farcaster_fid
            .map(|fid| i64::try_from(fid).map_err(|e| StoreError::Serialization(e.to_string())))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO users
            (id, twitter_user_id, twitter_username, farcaster_signer_uuid, farcaster_fid,
             farcaster_username, crosspost_enabled, last_post_id, last_post_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                twitter_user_id = excluded.twitter_user_id,
                twitter_username = excluded.twitter_username,
                farcaster_signer_uuid = excluded.farcaster_signer_uuid,
                farcaster_fid = excluded.farcaster_fid,
                farcaster_username = excluded.farcaster_username,
                crosspost_enabled = excluded.crosspost_enabled
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.twitter_user_id)
        .bind(&user.twitter_username)
        .bind(&user.farcaster_signer_uuid)
        .bind(fid)
        .bind(&user.farcaster_username)
        .bind(user.crosspost_enabled)
        .bind(&user.last_post_id)
        .bind(last_post_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn set_sync_position(
        &self,
        user_id: Uuid,
        last_post_id: Option<&str>,
        last_post_at: Option<OffsetDateTime>,
    ) -> Result<(), StoreError> {
        let last_post_at = last_post_at.map(format_ts).transpose()?;

        let updated = sqlx::query(
            "UPDATE users SET last_post_id = ?, last_post_at = ? WHERE id = ?",
        )
        .bind(last_post_id)
        .bind(last_post_at)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        Ok(())
    }

    async fn record_crosspost(&self, record: &PostRecord) -> Result<(), StoreError> {
        let source_posted_at = format_ts(record.source_posted_at)?;
        let created_at = format_ts(record.created_at)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO posts
            (id, user_id, source_post_id, text, destination_ref, source_posted_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(&record.source_post_id)
        .bind(&record.text)
        .bind(&record.destination_ref)
        .bind(&source_posted_at)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let updated = sqlx::query(
            "UPDATE users SET last_post_id = ?, last_post_at = ? WHERE id = ?",
        )
        .bind(&record.source_post_id)
        .bind(&source_posted_at)
        .bind(record.user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // Dropping the transaction rolls back the post insert
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", record.user_id)));
        }

        tx.commit().await.map_err(db_err)?;

        Ok(())
    }

    async fn recent_posts(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, source_post_id, text, destination_ref, source_posted_at, created_at
            FROM posts
            WHERE user_id = ?
            ORDER BY rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(post_from_row).collect()
    }

    async fn acquire_lease(
        &self,
        user_id: Uuid,
        owner: Uuid,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_leases (user_id, owner, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                owner = excluded.owner,
                expires_at = excluded.expires_at
            WHERE sync_leases.expires_at <= ? OR sync_leases.owner = excluded.owner
            "#,
        )
        .bind(user_id.to_string())
        .bind(owner.to_string())
        .bind(expires_at.unix_timestamp())
        .bind(now.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_lease(&self, user_id: Uuid, owner: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sync_leases WHERE user_id = ? AND owner = ?")
            .bind(user_id.to_string())
            .bind(owner.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}
