use crate::config::{StoreConfig, SCHEMA_VERSION};
use crate::error::StoreError;
use crate::models::{Conversation, ConversationInput};
use chrono::Utc;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::types::Json;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

// Schema version 1. Applied once, when the file reports user_version 0.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT, -- never reused
    timestamp INTEGER NOT NULL, -- Unix Timestamp (milliseconds)
    message TEXT NOT NULL,
    image TEXT, -- data URI
    image_filename TEXT,
    response TEXT NOT NULL -- JSON
);
CREATE INDEX IF NOT EXISTS idx_conversations_timestamp ON conversations(timestamp);
";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, message, image, image_filename, response FROM conversations";

/// Durable, time-ordered storage of conversations in a local SQLite file.
///
/// Construction does no I/O. The pool is opened on first use by whichever
/// operation gets there first; concurrent callers wait on that same open.
#[derive(Debug)]
pub struct ConversationStore {
    config: StoreConfig,
    pool: OnceCell<SqlitePool>,
    #[cfg(test)]
    opens: AtomicUsize,
}

impl ConversationStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
            #[cfg(test)]
            opens: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens the database, creating the file and schema if needed. Idempotent.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.pool().await.map(|_| ())
    }

    async fn pool(&self) -> Result<&SqlitePool, StoreError> {
        self.pool
            .get_or_try_init(|| {
                #[cfg(test)]
                self.opens.fetch_add(1, Ordering::SeqCst);
                Self::open(&self.config)
            })
            .await
    }

    async fn open(config: &StoreConfig) -> Result<SqlitePool, StoreError> {
        let db_path = &config.database_path;

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::StoreUnavailable(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        log::info!("Connecting to database: {}", db_path.display());
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::StoreUnavailable(format!("failed to open {}: {}", db_path.display(), e))
            })?;

        Self::ensure_schema(&pool).await?;
        Ok(pool)
    }

    /// Creates the version 1 schema on a fresh file and refuses any other version.
    async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        let mut conn = pool.acquire().await.map_err(schema_unavailable)?;

        // Take the write lock before reading the version so two first opens
        // of the same file queue on the busy timeout instead of deadlocking.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(schema_unavailable)?;

        match Self::apply_schema(&mut conn).await {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(schema_unavailable)?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    log::warn!("Failed to roll back schema transaction: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn apply_schema(conn: &mut SqliteConnection) -> Result<(), StoreError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(schema_unavailable)?;

        match version {
            0 => {
                log::info!("Creating conversation schema version {}", SCHEMA_VERSION);
                sqlx::query(SCHEMA_SQL)
                    .execute(&mut *conn)
                    .await
                    .map_err(schema_unavailable)?;
                let stamp = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
                sqlx::query(&stamp)
                    .execute(&mut *conn)
                    .await
                    .map_err(schema_unavailable)?;
            }
            SCHEMA_VERSION => {
                log::debug!("Found conversation schema version {}", version);
            }
            other => {
                return Err(StoreError::StoreUnavailable(format!(
                    "unsupported schema version {} (expected {})",
                    other, SCHEMA_VERSION
                )));
            }
        }
        Ok(())
    }

    /// Stores one conversation and returns its newly assigned id.
    pub async fn add(&self, input: ConversationInput) -> Result<i64, StoreError> {
        let pool = self.pool().await?;
        let timestamp = input.timestamp.unwrap_or_else(now_millis);
        log::debug!("Adding conversation with timestamp {}", timestamp);

        let id = insert_conversation(pool, &input, timestamp)
            .await
            .map_err(StoreError::WriteFailed)?;

        log::info!("Successfully added conversation with ID: {}", id);
        Ok(id)
    }

    /// Fetches every conversation, newest first.
    pub async fn list_all(&self) -> Result<Vec<Conversation>, StoreError> {
        let pool = self.pool().await?;
        log::debug!("Fetching all conversations from database");

        let query = format!("{} ORDER BY timestamp DESC, id DESC", SELECT_COLUMNS);
        let mut rows = sqlx::query(&query).fetch(pool);
        let mut conversations = Vec::new();
        while let Some(row) = rows.try_next().await.map_err(StoreError::ReadFailed)? {
            conversations.push(conversation_from_row(&row).map_err(StoreError::ReadFailed)?);
        }

        log::info!("Fetched {} conversations", conversations.len());
        Ok(conversations)
    }

    /// Fetches a single conversation; `None` when no record has that id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Conversation>, StoreError> {
        let pool = self.pool().await?;
        log::debug!("Fetching conversation with ID: {}", id);

        let query = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::ReadFailed)?;

        row.as_ref()
            .map(conversation_from_row)
            .transpose()
            .map_err(StoreError::ReadFailed)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let pool = self.pool().await?;
        sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(pool)
            .await
            .map_err(StoreError::ReadFailed)
    }

    /// Serializes all conversations (ids included) as pretty-printed JSON.
    pub async fn export_as_text(&self) -> Result<String, StoreError> {
        let conversations = self.list_all().await?;
        serde_json::to_string_pretty(&conversations).map_err(StoreError::ExportFailed)
    }

    /// Best-effort import: `true` only when the text parsed and every record
    /// was written. Failures are logged, never returned.
    pub async fn import_from_text(&self, text: &str) -> bool {
        match self.try_import_from_text(text).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Import rejected: {}", e);
                false
            }
        }
    }

    /// Imports a JSON array of conversations, ignoring their ids.
    ///
    /// The batch is written in one transaction: if any record fails, none of
    /// them are kept.
    pub async fn try_import_from_text(&self, text: &str) -> Result<usize, StoreError> {
        let records: Vec<ConversationInput> =
            serde_json::from_str(text).map_err(StoreError::ImportParseFailed)?;

        let pool = self.pool().await?;
        log::debug!("Importing {} conversations", records.len());

        let mut tx = pool.begin().await.map_err(StoreError::WriteFailed)?;
        for record in &records {
            let timestamp = record.timestamp.unwrap_or_else(now_millis);
            insert_conversation(&mut *tx, record, timestamp)
                .await
                .map_err(StoreError::WriteFailed)?;
        }
        tx.commit().await.map_err(StoreError::WriteFailed)?;

        log::info!("Imported {} conversations", records.len());
        Ok(records.len())
    }
}

fn schema_unavailable(e: sqlx::Error) -> StoreError {
    StoreError::StoreUnavailable(format!("failed to prepare schema: {}", e))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

async fn insert_conversation<'e, E>(
    executor: E,
    input: &ConversationInput,
    timestamp: i64,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO conversations (timestamp, message, image, image_filename, response)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(timestamp)
    .bind(input.message.as_str())
    .bind(input.image.as_deref())
    .bind(input.image_filename.as_deref())
    .bind(Json(&input.response))
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation, sqlx::Error> {
    let Json(response): Json<Value> = row.try_get("response")?;
    Ok(Conversation {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        message: row.try_get("message")?,
        image: row.try_get("image")?,
        image_filename: row.try_get("image_filename")?,
        response,
    })
}
