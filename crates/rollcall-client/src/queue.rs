//! # Offline Intent Queue
//!
//! Durable FIFO of check-ins and overrides that could not reach the server.
//! Backed by one SQLite file; `seq` gives creation order and `local_id` is
//! the stable identity that survives restarts. Rows are inserted and
//! deleted, never updated.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::QueueError;
use crate::types::OverrideEntry;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS offline_intents (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    local_id   TEXT    NOT NULL UNIQUE,
    kind       TEXT    NOT NULL,
    payload    TEXT    NOT NULL,
    created_at TEXT    NOT NULL
)";

/// What the user did while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// A scanned credential.
    CheckIn { credential: String },
    /// A teacher's override batch.
    Override { entries: Vec<OverrideEntry> },
}

impl Intent {
    /// Value of the `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CheckIn { .. } => "check_in",
            Self::Override { .. } => "override",
        }
    }
}

/// A queued intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineIntent {
    pub seq: i64,
    pub local_id: Uuid,
    pub intent: Intent,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed queue. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    pool: SqlitePool,
}

impl OfflineQueue {
    /// Open (creating if missing) the queue file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// A queue that lives only as long as this value, for tests and dry runs.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, QueueError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Append an intent and return it with its assigned identity.
    pub async fn enqueue(&self, intent: Intent) -> Result<OfflineIntent, QueueError> {
        let local_id = Uuid::new_v4();
        let created_at = Utc::now();
        let payload = serde_json::to_string(&intent).map_err(|e| QueueError::Corrupt {
            local_id: local_id.to_string(),
            reason: e.to_string(),
        })?;
        let result = sqlx::query(
            "INSERT INTO offline_intents (local_id, kind, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(local_id.to_string())
        .bind(intent.kind())
        .bind(payload)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        tracing::info!(local_id = %local_id, kind = intent.kind(), "intent queued offline");
        Ok(OfflineIntent {
            seq: result.last_insert_rowid(),
            local_id,
            intent,
            created_at,
        })
    }

    /// Every queued intent, oldest first.
    pub async fn pending(&self) -> Result<Vec<OfflineIntent>, QueueError> {
        let rows = sqlx::query(
            "SELECT seq, local_id, payload, created_at FROM offline_intents ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let seq: i64 = row.try_get("seq")?;
                let local_id: String = row.try_get("local_id")?;
                let payload: String = row.try_get("payload")?;
                let created_at: String = row.try_get("created_at")?;
                decode_row(seq, &local_id, &payload, &created_at)
            })
            .collect()
    }

    /// Delete an acknowledged intent. Returns `false` if it was not queued.
    pub async fn remove(&self, local_id: Uuid) -> Result<bool, QueueError> {
        let result = sqlx::query("DELETE FROM offline_intents WHERE local_id = ?1")
            .bind(local_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Number of queued intents.
    pub async fn len(&self) -> Result<usize, QueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_intents")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Close the underlying pool, flushing the file.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_row(
    seq: i64,
    local_id: &str,
    payload: &str,
    created_at: &str,
) -> Result<OfflineIntent, QueueError> {
    let corrupt = |reason: String| QueueError::Corrupt {
        local_id: local_id.to_string(),
        reason,
    };
    Ok(OfflineIntent {
        seq,
        local_id: Uuid::parse_str(local_id).map_err(|e| corrupt(e.to_string()))?,
        intent: serde_json::from_str(payload).map_err(|e| corrupt(e.to_string()))?,
        created_at: DateTime::parse_from_rfc3339(created_at)
            .map_err(|e| corrupt(e.to_string()))?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{AttendanceStatus, SchoolDay, StudentId};

    fn check_in(credential: &str) -> Intent {
        Intent::CheckIn {
            credential: credential.into(),
        }
    }

    #[tokio::test]
    async fn pending_is_in_creation_order() {
        let queue = OfflineQueue::in_memory().await.unwrap();
        let a = queue.enqueue(check_in("a")).await.unwrap();
        let b = queue
            .enqueue(Intent::Override {
                entries: vec![OverrideEntry {
                    student_id: StudentId::new(1),
                    day: SchoolDay::parse("2025-03-10").unwrap(),
                    status: AttendanceStatus::Sick,
                }],
            })
            .await
            .unwrap();
        let c = queue.enqueue(check_in("c")).await.unwrap();

        let pending = queue.pending().await.unwrap();
        let ids: Vec<Uuid> = pending.iter().map(|i| i.local_id).collect();
        assert_eq!(ids, vec![a.local_id, b.local_id, c.local_id]);
        assert!(a.seq < b.seq && b.seq < c.seq);
        assert_eq!(pending[1].intent, b.intent);
    }

    #[tokio::test]
    async fn remove_is_by_local_id() {
        let queue = OfflineQueue::in_memory().await.unwrap();
        let a = queue.enqueue(check_in("a")).await.unwrap();
        let b = queue.enqueue(check_in("b")).await.unwrap();

        assert!(queue.remove(a.local_id).await.unwrap());
        assert!(!queue.remove(a.local_id).await.unwrap());
        assert_eq!(queue.len().await.unwrap(), 1);
        assert_eq!(queue.pending().await.unwrap()[0].local_id, b.local_id);
    }

    #[tokio::test]
    async fn empty_queue() {
        let queue = OfflineQueue::in_memory().await.unwrap();
        assert!(queue.is_empty().await.unwrap());
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[test]
    fn intent_kinds() {
        assert_eq!(check_in("x").kind(), "check_in");
        assert_eq!(Intent::Override { entries: vec![] }.kind(), "override");
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let err = decode_row(1, &Uuid::new_v4().to_string(), "{not json", "2025-03-10T07:00:00Z")
            .unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));
    }
}
