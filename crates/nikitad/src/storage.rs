//! SQLite storage for the assistant.
//!
//! Persists the conversation transcript, monthly API usage counters and the
//! conversation audit log.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use nikita_core::context::{Memory, MemoryError};
use nikita_core::events::{Event, EventPayload};
use nikita_core::{Id, Speaker, SpeechPriority};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One line of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub id: Id,
    pub speaker: Speaker,
    /// Set for assistant lines only.
    pub priority: Option<SpeechPriority>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Storage backend for the assistant.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    /// Open (or create) the database at `db_path`.
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Create tables and indexes. Safe to run on every start.
    pub async fn migrate_embedded(&self) -> Result<()> {
        let migrations = [include_str!("../../../migrations/0001_init.sql")];

        for migration_sql in migrations {
            let cleaned: String = migration_sql
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");

            for statement in cleaned.split(';') {
                let trimmed = statement.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Err(e) = sqlx::query(trimmed).execute(&self.pool).await {
                    let msg = e.to_string();
                    if !msg.contains("duplicate column") && !msg.contains("already exists") {
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }

    // --- Transcript ---

    /// Append a line to the transcript.
    pub async fn append_transcript(
        &self,
        speaker: Speaker,
        priority: Option<SpeechPriority>,
        text: &str,
    ) -> Result<TranscriptLine> {
        let id = Id::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO transcript (id, speaker, priority, text, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.as_ref())
        .bind(speaker.as_str())
        .bind(priority.map(|p| p.as_str()))
        .bind(text)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(TranscriptLine {
            id,
            speaker,
            priority,
            text: text.to_string(),
            timestamp: now,
        })
    }

    /// Most recent transcript lines, oldest first.
    pub async fn recent_transcript(&self, limit: u32) -> Result<Vec<TranscriptLine>> {
        let mut rows = sqlx::query_as::<_, TranscriptRow>(
            "SELECT id, speaker, priority, text, ts FROM transcript ORDER BY ts DESC, id DESC LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.reverse();

        Ok(rows.into_iter().map(TranscriptRow::into_line).collect())
    }

    /// The latest line spoken by the assistant.
    pub async fn last_assistant_line(&self) -> Result<Option<TranscriptLine>> {
        let row = sqlx::query_as::<_, TranscriptRow>(
            "SELECT id, speaker, priority, text, ts FROM transcript \
             WHERE speaker = ?1 ORDER BY ts DESC, id DESC LIMIT 1",
        )
        .bind(Speaker::Assistant.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TranscriptRow::into_line))
    }

    // --- API usage ---

    /// Count one call to `api` against the current month.
    pub async fn increment_api_usage(&self, api: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_usage (month, api, call_count) VALUES (?1, ?2, 1)
            ON CONFLICT(month, api) DO UPDATE SET call_count = call_count + 1
            "#,
        )
        .bind(current_month())
        .bind(api)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Calls recorded for `api` in `month` (`MM-YYYY`).
    pub async fn api_usage(&self, api: &str, month: &str) -> Result<i64> {
        let count: Option<(i64,)> =
            sqlx::query_as("SELECT call_count FROM api_usage WHERE month = ?1 AND api = ?2")
                .bind(month)
                .bind(api)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.map_or(0, |(c,)| c))
    }

    // --- Event operations ---

    /// Append an event to the audit log.
    pub async fn append_event(&self, payload: &EventPayload) -> Result<Event> {
        let id = Id::new();
        let now = Utc::now();
        let turn_id = payload.turn_id().cloned();
        let event_type = payload.event_type().as_str().to_string();
        let payload_json = payload.to_json()?;

        sqlx::query(
            "INSERT INTO events (id, turn_id, type, ts, payload_json) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.as_ref())
        .bind(turn_id.as_ref().map(|t| t.as_ref()))
        .bind(&event_type)
        .bind(now.timestamp_millis())
        .bind(&payload_json)
        .execute(&self.pool)
        .await?;

        Ok(Event {
            id,
            turn_id,
            event_type,
            timestamp: now,
            payload_json,
        })
    }

    /// List events for a turn.
    pub async fn list_events(&self, turn_id: &Id) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, turn_id, type, ts, payload_json FROM events WHERE turn_id = ?1 ORDER BY ts ASC, id ASC",
        )
        .bind(turn_id.as_ref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    /// List every event, oldest first.
    pub async fn list_all_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, turn_id, type, ts, payload_json FROM events ORDER BY ts ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }
}

#[async_trait]
impl Memory for Storage {
    async fn last_spoken(&self) -> std::result::Result<Option<String>, MemoryError> {
        self.last_assistant_line()
            .await
            .map(|line| line.map(|l| l.text))
            .map_err(|e| MemoryError::Backend(e.to_string()))
    }

    async fn record_api_call(&self, api: &str) -> std::result::Result<(), MemoryError> {
        self.increment_api_usage(api)
            .await
            .map_err(|e| MemoryError::Backend(e.to_string()))
    }
}

/// Month key for API usage counters.
pub fn current_month() -> String {
    Local::now().format("%m-%Y").to_string()
}

#[derive(sqlx::FromRow)]
struct TranscriptRow {
    id: String,
    speaker: String,
    priority: Option<String>,
    text: String,
    ts: i64,
}

impl TranscriptRow {
    fn into_line(self) -> TranscriptLine {
        let speaker = match self.speaker.as_str() {
            "assistant" => Speaker::Assistant,
            _ => Speaker::User,
        };
        TranscriptLine {
            id: Id::from_string(self.id),
            speaker,
            priority: self.priority.as_deref().and_then(SpeechPriority::parse),
            text: self.text,
            timestamp: DateTime::from_timestamp_millis(self.ts).unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    turn_id: Option<String>,
    #[sqlx(rename = "type")]
    event_type: String,
    ts: i64,
    payload_json: String,
}

impl EventRow {
    fn into_event(self) -> Event {
        Event {
            id: Id::from_string(self.id),
            turn_id: self.turn_id.map(Id::from_string),
            event_type: self.event_type,
            timestamp: DateTime::from_timestamp_millis(self.ts).unwrap_or_default(),
            payload_json: self.payload_json,
        }
    }
}
