// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue store used by the relay pipeline.
//!
//! Binds a [`Database`] to the configured retry cap and retention window so
//! callers never pass those around.

use chrono::{Duration, Utc};
use courier_config::model::{QueueConfig, StorageConfig};
use courier_core::{NewDelivery, QueuedDelivery, RelayError};
use tracing::debug;

use crate::database::Database;
use crate::queries::{messages, queue};

/// SQLite-backed durable delivery queue.
#[derive(Clone)]
pub struct QueueStore {
    db: Database,
    max_retries: u32,
    retention: Duration,
}

impl QueueStore {
    pub fn new(db: Database, max_retries: u32, retention_days: u32) -> Self {
        Self {
            db,
            max_retries,
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    /// Open the database described by `storage` and apply `queue` limits.
    pub async fn open(storage: &StorageConfig, queue: &QueueConfig) -> Result<Self, RelayError> {
        let db = Database::open_with(&storage.database_path, storage.wal_mode).await?;
        Ok(Self::new(db, queue.max_retries, queue.retention_days))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn enqueue(&self, delivery: &NewDelivery) -> Result<i64, RelayError> {
        let id = queue::enqueue(&self.db, delivery).await?;
        debug!(
            id,
            message_id = delivery.source_message_id,
            chat_id = delivery.source_chat_id,
            is_edit = delivery.is_edit,
            "delivery enqueued"
        );
        Ok(id)
    }

    pub async fn select_retry_eligible(&self, limit: u32) -> Result<Vec<QueuedDelivery>, RelayError> {
        queue::select_retry_eligible(&self.db, limit, self.max_retries).await
    }

    pub async fn mark_completed(&self, id: i64) -> Result<(), RelayError> {
        queue::mark_completed(&self.db, id).await
    }

    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<(), RelayError> {
        queue::mark_failed(&self.db, id, error).await
    }

    /// Retire a record whose source is gone for good.
    pub async fn mark_abandoned(&self, id: i64, error: &str) -> Result<(), RelayError> {
        queue::mark_abandoned(&self.db, id, error, self.max_retries).await
    }

    /// Purge non-pending records older than the retention window, then the
    /// archived source messages nothing unfinished refers to. Returns the
    /// number of queue records removed.
    pub async fn purge_expired(&self) -> Result<usize, RelayError> {
        let cutoff = Utc::now() - self.retention;
        let purged = queue::purge_older_than(&self.db, cutoff).await?;
        let snapshots = messages::purge_unreferenced(&self.db, cutoff).await?;
        if snapshots > 0 {
            debug!(snapshots, "archived source messages purged");
        }
        Ok(purged)
    }

    pub async fn find_by_source(
        &self,
        message_id: i64,
        chat_id: i64,
    ) -> Result<Option<QueuedDelivery>, RelayError> {
        queue::find_by_source(&self.db, message_id, chat_id).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<QueuedDelivery>, RelayError> {
        queue::get(&self.db, id).await
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<QueuedDelivery>, RelayError> {
        queue::list_recent(&self.db, limit).await
    }

    /// Flush the WAL. Called on clean shutdown.
    pub async fn checkpoint(&self) -> Result<(), RelayError> {
        self.db.checkpoint().await
    }
}
