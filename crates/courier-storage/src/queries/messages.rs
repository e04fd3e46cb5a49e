// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source message snapshots.
//!
//! Each observed message is stored as JSON keyed by `(chat_id, message_id)`.
//! A later edit replaces the snapshot.

use chrono::{DateTime, Utc};
use courier_core::{RelayError, SourceMessage};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::queue::format_timestamp;

/// Insert or replace the snapshot for a message.
pub async fn save(
    db: &Database,
    message: &SourceMessage,
    observed_at: DateTime<Utc>,
) -> Result<(), RelayError> {
    let payload = serde_json::to_string(message).map_err(|e| RelayError::Storage {
        source: Box::new(e),
    })?;
    let chat_id = message.chat_id;
    let message_id = message.id;
    let observed_at = format_timestamp(&observed_at);

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO source_messages (chat_id, message_id, payload, observed_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (chat_id, message_id)
                 DO UPDATE SET payload = excluded.payload, observed_at = excluded.observed_at",
                params![chat_id, message_id, payload, observed_at],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(())
}

/// The stored snapshot, if the message was observed and not yet purged.
pub async fn load(
    db: &Database,
    chat_id: i64,
    message_id: i64,
) -> Result<Option<SourceMessage>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT payload FROM source_messages WHERE chat_id = ?1 AND message_id = ?2",
                params![chat_id, message_id],
                |row| {
                    let payload: String = row.get(0)?;
                    serde_json::from_str::<SourceMessage>(&payload).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete snapshots observed before `cutoff` that no unfinished delivery
/// still points at. Returns how many were removed.
pub async fn purge_unreferenced(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<usize, RelayError> {
    let cutoff = format_timestamp(&cutoff);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM source_messages
                 WHERE observed_at < ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM queued_deliveries q
                       WHERE q.source_chat_id = source_messages.chat_id
                         AND q.source_message_id = source_messages.message_id
                         AND q.status != 'completed'
                   )",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}
