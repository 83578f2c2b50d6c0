//! libSQL backend for the duplicate tracker.
//!
//! Each `mark_processed` is one `INSERT OR IGNORE`, so a crash can never
//! leave a half-written record or damage earlier ones.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{ProcessedRecord, ProcessedStore, TrackerStats};

/// libSQL-backed duplicate tracker.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlTracker {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    /// Records older than this are pruned lazily.
    retention: chrono::Duration,
}

impl LibSqlTracker {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path, retention: chrono::Duration) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let tracker = Self::from_database(db, retention).await?;
        info!(path = %path.display(), "Tracker database opened");
        Ok(tracker)
    }

    /// Create an in-memory tracker. Nothing survives a restart.
    pub async fn new_memory(retention: chrono::Duration) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db, retention).await
    }

    /// Open the file database, or fall back to memory if it is unreadable.
    ///
    /// With the fallback every message looks unprocessed, so replies are
    /// never silently dropped because of a damaged history file.
    pub async fn open_or_memory(
        path: &Path,
        retention: chrono::Duration,
    ) -> Result<Self, DatabaseError> {
        match Self::new_local(path, retention).await {
            Ok(tracker) => Ok(tracker),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Tracker database unreadable, continuing with in-memory history"
                );
                Self::new_memory(retention).await
            }
        }
    }

    async fn from_database(
        db: LibSqlDatabase,
        retention: chrono::Duration,
    ) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        // A file that is not a database only fails on first real read.
        conn.query("SELECT COUNT(*) FROM processed_messages", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("Tracker table unreadable: {e}")))?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            retention,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Delete records older than the retention period.
    pub async fn prune(&self) -> Result<usize, DatabaseError> {
        let cutoff = format_datetime(Utc::now() - self.retention);
        let removed = self
            .conn()
            .execute(
                "DELETE FROM processed_messages WHERE processed_at < ?1",
                params![cutoff],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to prune history: {e}")))?;
        if removed > 0 {
            debug!(removed, "Pruned expired tracker records");
        }
        Ok(removed as usize)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 (`2026-01-02T03:04:05Z`) so string order is time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn window_cutoff(window: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::hours(24));
    Utc::now() - window
}

// ── ProcessedStore ──────────────────────────────────────────────────

#[async_trait]
impl ProcessedStore for LibSqlTracker {
    async fn has_been_processed(&self, message_id: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM processed_messages WHERE message_id = ?1 LIMIT 1",
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to look up message: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read lookup row: {e}")))?;
        Ok(row.is_some())
    }

    async fn mark_processed(&self, record: &ProcessedRecord) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO processed_messages
                    (message_id, sender, category, processed_at, subject, replied)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.message_id.as_str(),
                    record.sender_address.to_lowercase(),
                    record.category.as_str(),
                    format_datetime(record.processed_at),
                    record.subject.as_str(),
                    i64::from(record.replied),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to record message: {e}")))?;

        if inserted == 0 {
            debug!(message_id = %record.message_id, "Message already recorded");
        }
        Ok(inserted > 0)
    }

    async fn count_recent_for_sender(
        &self,
        sender_address: &str,
        window: Duration,
    ) -> Result<usize, DatabaseError> {
        self.prune().await?;

        let cutoff = format_datetime(window_cutoff(window));
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM processed_messages
                 WHERE sender = ?1 AND processed_at >= ?2",
                params![sender_address.trim().to_lowercase(), cutoff],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count sender history: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("Bad count row: {e}")))?;
                Ok(count.max(0) as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!(
                "Failed to read sender count: {e}"
            ))),
        }
    }

    async fn stats(&self) -> Result<TrackerStats, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT category, COUNT(*), COALESCE(SUM(replied), 0)
                 FROM processed_messages GROUP BY category",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read stats: {e}")))?;

        let mut stats = TrackerStats {
            by_category: BTreeMap::new(),
            ..Default::default()
        };
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read stats row: {e}")))?
        {
            let category: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Bad stats row: {e}")))?;
            let count: i64 = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("Bad stats row: {e}")))?;
            let replied: i64 = row
                .get(2)
                .map_err(|e| DatabaseError::Query(format!("Bad stats row: {e}")))?;

            stats.total_processed += count as usize;
            stats.replies_sent += replied as usize;
            stats.by_category.insert(category, count as usize);
        }
        Ok(stats)
    }
}
