//! SQLite store for connected accounts and published posts

use async_trait::async_trait;
use crosspost_domain::{
    AccountCredential, AccountDirectory, AccountError, Clock, PersistError, Platform, Post,
    PostHistory, PublishResult, PublishStatus, ResultPersister, SocialAccount, SystemClock,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

type PostRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

type AccountRow = (String, String, String, String, Option<String>, String);

fn format_time(at: OffsetDateTime) -> Result<String, String> {
    at.format(&Rfc3339).map_err(|e| e.to_string())
}

fn parse_time(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| e.to_string())
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PersistError::Database(format!("Failed to create directory: {}", e))
            })?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| PersistError::Database(e.to_string()))?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, PersistError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| PersistError::Database(e.to_string()))?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, PersistError> {
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Replace the clock used to stamp new records
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Verify the database answers queries
    pub async fn ping(&self) -> Result<(), PersistError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| PersistError::Database(e.to_string()))?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), PersistError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS social_accounts (
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                platform_account_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                display_name TEXT,
                connected_at TEXT NOT NULL,
                UNIQUE(user_id, platform)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                platform_post_id TEXT NOT NULL,
                message TEXT NOT NULL,
                media_urls TEXT NOT NULL,
                posted_at TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_user
            ON posts(user_id, posted_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistError::Database(e.to_string()))?;

        Ok(())
    }
}

fn post_from_row(row: PostRow) -> Result<Post, PersistError> {
    let (
        id,
        user_id,
        platform,
        platform_post_id,
        message,
        media_urls,
        posted_at,
        status,
        created_at,
        updated_at,
    ) = row;
    let ser = PersistError::Serialization;

    Ok(Post {
        id: Uuid::parse_str(&id).map_err(|e| ser(e.to_string()))?,
        user_id: Uuid::parse_str(&user_id).map_err(|e| ser(e.to_string()))?,
        platform: platform
            .parse::<Platform>()
            .map_err(|e| ser(e.to_string()))?,
        platform_post_id,
        message,
        media_urls: serde_json::from_str(&media_urls).map_err(|e| ser(e.to_string()))?,
        posted_at: parse_time(&posted_at).map_err(ser)?,
        status: status.parse::<PublishStatus>().map_err(ser)?,
        created_at: parse_time(&created_at).map_err(ser)?,
        updated_at: parse_time(&updated_at).map_err(ser)?,
    })
}

fn account_from_row(row: AccountRow) -> Result<SocialAccount, AccountError> {
    let (user_id, platform, platform_account_id, access_token, display_name, connected_at) = row;
    let ser = AccountError::Serialization;

    Ok(SocialAccount {
        user_id: Uuid::parse_str(&user_id).map_err(|e| ser(e.to_string()))?,
        platform: platform
            .parse::<Platform>()
            .map_err(|e| ser(e.to_string()))?,
        platform_account_id,
        access_token: SecretString::new(access_token.into()),
        display_name,
        connected_at: parse_time(&connected_at).map_err(ser)?,
    })
}

const POST_COLUMNS: &str = "id, user_id, platform, platform_post_id, message, media_urls, \
                            posted_at, status, created_at, updated_at";

#[async_trait]
impl ResultPersister for SqliteStore {
    async fn save(&self, result: &PublishResult, user_id: Uuid) -> Result<Post, PersistError> {
        let post = Post::from_result(result, user_id, self.clock.now());

        let media_urls = serde_json::to_string(&post.media_urls)
            .map_err(|e| PersistError::Serialization(e.to_string()))?;
        let posted_at = format_time(post.posted_at).map_err(PersistError::Serialization)?;
        let created_at = format_time(post.created_at).map_err(PersistError::Serialization)?;
        let updated_at = format_time(post.updated_at).map_err(PersistError::Serialization)?;

        sqlx::query(
            r#"
            INSERT INTO posts
            (id, user_id, platform, platform_post_id, message, media_urls,
             posted_at, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.id.to_string())
        .bind(post.user_id.to_string())
        .bind(post.platform.as_str())
        .bind(&post.platform_post_id)
        .bind(&post.message)
        .bind(&media_urls)
        .bind(&posted_at)
        .bind(post.status.as_str())
        .bind(&created_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistError::Database(e.to_string()))?;

        tracing::debug!(post_id = %post.id, platform = %post.platform, "Saved post");

        Ok(post)
    }
}

#[async_trait]
impl PostHistory for SqliteStore {
    async fn list_posts(
        &self,
        user_id: Uuid,
        platform: Option<Platform>,
    ) -> Result<Vec<Post>, PersistError> {
        let rows: Vec<PostRow> = match platform {
            Some(platform) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM posts WHERE user_id = ? AND platform = ? \
                     ORDER BY posted_at DESC, rowid DESC",
                    POST_COLUMNS
                ))
                .bind(user_id.to_string())
                .bind(platform.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM posts WHERE user_id = ? ORDER BY posted_at DESC, rowid DESC",
                    POST_COLUMNS
                ))
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| PersistError::Database(e.to_string()))?;

        rows.into_iter().map(post_from_row).collect()
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, PersistError> {
        let row: Option<PostRow> = sqlx::query_as(&format!(
            "SELECT {} FROM posts WHERE id = ?",
            POST_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistError::Database(e.to_string()))?;

        row.map(post_from_row).transpose()
    }
}

#[async_trait]
impl AccountDirectory for SqliteStore {
    async fn credential(
        &self,
        user_id: Uuid,
        platform: Platform,
    ) -> Result<AccountCredential, AccountError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT platform_account_id, access_token FROM social_accounts \
             WHERE user_id = ? AND platform = ?",
        )
        .bind(user_id.to_string())
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::Database(e.to_string()))?;

        let (platform_account_id, access_token) =
            row.ok_or(AccountError::NotConnected { user_id, platform })?;

        Ok(AccountCredential::new(
            SecretString::new(access_token.into()),
            platform_account_id,
        ))
    }

    async fn connect(&self, account: &SocialAccount) -> Result<(), AccountError> {
        let connected_at =
            format_time(account.connected_at).map_err(AccountError::Serialization)?;

        sqlx::query(
            r#"
            INSERT INTO social_accounts
            (user_id, platform, platform_account_id, access_token, display_name, connected_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, platform) DO UPDATE SET
                platform_account_id = excluded.platform_account_id,
                access_token = excluded.access_token,
                display_name = excluded.display_name,
                connected_at = excluded.connected_at
            "#,
        )
        .bind(account.user_id.to_string())
        .bind(account.platform.as_str())
        .bind(&account.platform_account_id)
        .bind(account.access_token.expose_secret())
        .bind(&account.display_name)
        .bind(&connected_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<SocialAccount>, AccountError> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            r#"
            SELECT user_id, platform, platform_account_id, access_token, display_name, connected_at
            FROM social_accounts
            WHERE user_id = ?
            ORDER BY platform
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AccountError::Database(e.to_string()))?;

        rows.into_iter().map(account_from_row).collect()
    }
}
