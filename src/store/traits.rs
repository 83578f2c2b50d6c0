//! The duplicate tracker's async interface.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::pipeline::types::Category;

/// One handled inbound message. Append-only.
#[derive(Debug, Clone)]
pub struct ProcessedRecord {
    pub message_id: String,
    /// Stored lower-cased.
    pub sender_address: String,
    pub processed_at: DateTime<Utc>,
    pub category: Category,
    pub subject: String,
    /// False for deliberate skips (spam, rate-limited).
    pub replied: bool,
}

impl ProcessedRecord {
    pub fn new(
        message_id: impl Into<String>,
        sender_address: &str,
        category: Category,
        subject: impl Into<String>,
        replied: bool,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender_address: sender_address.trim().to_lowercase(),
            processed_at: Utc::now(),
            category,
            subject: subject.into(),
            replied,
        }
    }

    pub fn at(mut self, processed_at: DateTime<Utc>) -> Self {
        self.processed_at = processed_at;
        self
    }
}

/// Aggregate counts over the tracker's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub total_processed: usize,
    pub replies_sent: usize,
    pub by_category: BTreeMap<String, usize>,
}

#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Exact match on `message_id`.
    async fn has_been_processed(&self, message_id: &str) -> Result<bool, DatabaseError>;

    /// Insert a record. Returns `false` if the id was already present,
    /// in which case nothing changes.
    async fn mark_processed(&self, record: &ProcessedRecord) -> Result<bool, DatabaseError>;

    /// Records for `sender_address` (case-insensitive) inside the trailing
    /// `window`. Prunes expired history first.
    async fn count_recent_for_sender(
        &self,
        sender_address: &str,
        window: Duration,
    ) -> Result<usize, DatabaseError>;

    async fn stats(&self) -> Result<TrackerStats, DatabaseError>;
}
