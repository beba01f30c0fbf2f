//! SQLite store.
//!
//! Uses a single SQLite database file with two tables:
//! - `conversations`: one row per user (owner is unique)
//! - `messages`: JSON-encoded messages keyed by an autoincrement sequence
//!
//! Appends run inside one transaction, so a turn's messages land together.
//! Rows that no longer decode are skipped with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::StoreError;
use parley_core::store::conversation_title;
use parley_core::{ConversationId, Message, MessageStore, UserProfile};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a SQLite store from a file path.
    ///
    /// The database and tables are created automatically.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to `:memory:` is its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite message store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id          TEXT PRIMARY KEY,
                owner       TEXT UNIQUE NOT NULL,
                title       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                payload         TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn exists(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM conversations WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(row.is_some())
    }
}

fn not_found(id: &ConversationId) -> StoreError {
    StoreError::ConversationNotFound(id.to_string())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("Invalid timestamp '{raw}': {e}")))
}

#[async_trait]
impl MessageStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_or_create(&self, user: &UserProfile) -> Result<ConversationId, StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO conversations (id, owner, title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(owner) DO NOTHING
            "#,
        )
        .bind(ConversationId::new().as_str())
        .bind(&user.id)
        .bind(conversation_title(user, now))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to create conversation: {e}")))?;

        let row = sqlx::query("SELECT id FROM conversations WHERE owner = ?")
            .bind(&user.id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(ConversationId(id))
    }

    async fn recent(&self, id: &ConversationId, limit: usize) -> Result<Vec<Message>, StoreError> {
        if !self.exists(id).await? {
            return Err(not_found(id));
        }

        let rows = sqlx::query(
            r#"
            SELECT payload FROM (
                SELECT seq, payload FROM messages
                WHERE conversation_id = ?
                ORDER BY seq DESC
                LIMIT ?
            ) ORDER BY seq ASC
            "#,
        )
        .bind(id.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let payload: String = row
                .try_get("payload")
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            match serde_json::from_str(&payload) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Skipping corrupted message row");
                }
            }
        }
        Ok(messages)
    }

    async fn append(&self, id: &ConversationId, messages: &[Message]) -> Result<(), StoreError> {
        if !self.exists(id).await? {
            return Err(not_found(id));
        }
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        for message in messages {
            let payload = serde_json::to_string(message)
                .map_err(|e| StoreError::Storage(format!("Failed to serialize message: {e}")))?;
            sqlx::query("INSERT INTO messages (conversation_id, payload) VALUES (?, ?)")
                .bind(id.as_str())
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("Failed to append message: {e}")))?;
        }

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to commit append: {e}")))
    }

    async fn clear(&self, id: &ConversationId) -> Result<(), StoreError> {
        if !self.exists(id).await? {
            return Err(not_found(id));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to clear history: {e}")))?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to commit clear: {e}")))
    }

    async fn last_updated(&self, id: &ConversationId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query("SELECT updated_at FROM conversations WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("updated_at")
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                parse_time(&raw).map(Some)
            }
            None => Ok(None),
        }
    }
}
