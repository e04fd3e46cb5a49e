// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for durable delivery records.
//!
//! `pending` and `failed` records form one retry-eligible class, separated
//! only by `retry_count`. `retry_count` only ever grows.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use courier_core::{DeliveryStatus, NewDelivery, QueuedDelivery, RelayError};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, source_message_id, source_chat_id, text_snapshot, \
                       media_path_snapshot, created_at, retry_count, status, \
                       last_error, is_edit";

/// Timestamps are stored as fixed-width UTC strings so text order is time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_delivery(row: &Row<'_>) -> rusqlite::Result<QueuedDelivery> {
    let created_at: String = row.get(5)?;
    let status: String = row.get(7)?;
    let media: Option<String> = row.get(4)?;
    Ok(QueuedDelivery {
        id: row.get(0)?,
        source_message_id: row.get(1)?,
        source_chat_id: row.get(2)?,
        text_snapshot: row.get(3)?,
        media_path_snapshot: media.map(PathBuf::from),
        created_at: parse_timestamp(5, &created_at)?,
        retry_count: row.get(6)?,
        status: DeliveryStatus::from_str(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
        })?,
        last_error: row.get(8)?,
        is_edit: row.get(9)?,
    })
}

/// Insert a new `pending` record with `retry_count = 0`. Returns its id.
pub async fn enqueue(db: &Database, delivery: &NewDelivery) -> Result<i64, RelayError> {
    let message_id = delivery.source_message_id;
    let chat_id = delivery.source_chat_id;
    let text = delivery.text_snapshot.clone();
    let media = delivery
        .media_path_snapshot
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    let created_at = format_timestamp(&delivery.created_at);
    let is_edit = delivery.is_edit;

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queued_deliveries
                 (source_message_id, source_chat_id, text_snapshot, media_path_snapshot,
                  created_at, retry_count, status, is_edit)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending', ?6)",
                params![message_id, chat_id, text, media, created_at, is_edit],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Up to `limit` records with `status != completed AND retry_count < max_retries`,
/// oldest first (`created_at`, then `id`).
pub async fn select_retry_eligible(
    db: &Database,
    limit: u32,
    max_retries: u32,
) -> Result<Vec<QueuedDelivery>, RelayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM queued_deliveries
                 WHERE status != 'completed' AND retry_count < ?1
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![max_retries, limit], row_to_delivery)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a record delivered.
pub async fn mark_completed(db: &Database, id: i64) -> Result<(), RelayError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queued_deliveries SET status = 'completed', last_error = NULL
                 WHERE id = ?1",
                params![id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, id)
}

/// Record a failed attempt: `status = failed`, `retry_count + 1`, error stored.
pub async fn mark_failed(db: &Database, id: i64, error: &str) -> Result<(), RelayError> {
    let error = error.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queued_deliveries
                 SET status = 'failed', retry_count = retry_count + 1, last_error = ?2
                 WHERE id = ?1",
                params![id, error],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, id)
}

/// Retire a record that can never succeed: `status = failed` and
/// `retry_count` raised to `max_retries` so it is never selected again.
pub async fn mark_abandoned(
    db: &Database,
    id: i64,
    error: &str,
    max_retries: u32,
) -> Result<(), RelayError> {
    let error = error.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queued_deliveries
                 SET status = 'failed', retry_count = MAX(retry_count, ?2), last_error = ?3
                 WHERE id = ?1",
                params![id, max_retries, error],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, id)
}

/// Delete non-`pending` records created before `cutoff`. Returns how many
/// were removed. Media files are left alone.
pub async fn purge_older_than(db: &Database, cutoff: DateTime<Utc>) -> Result<usize, RelayError> {
    let cutoff = format_timestamp(&cutoff);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM queued_deliveries WHERE status != 'pending' AND created_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent record for a source message, if any.
pub async fn find_by_source(
    db: &Database,
    message_id: i64,
    chat_id: i64,
) -> Result<Option<QueuedDelivery>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM queued_deliveries
                     WHERE source_message_id = ?1 AND source_chat_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![message_id, chat_id],
                row_to_delivery,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a record by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<QueuedDelivery>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM queued_deliveries WHERE id = ?1"),
                params![id],
                row_to_delivery,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Newest records first, regardless of status.
pub async fn list_recent(db: &Database, limit: u32) -> Result<Vec<QueuedDelivery>, RelayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM queued_deliveries ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], row_to_delivery)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

fn ensure_changed(changed: usize, id: i64) -> Result<(), RelayError> {
    if changed == 0 {
        return Err(RelayError::RecordNotFound {
            what: format!("queued delivery {id}"),
        });
    }
    Ok(())
}
