// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier queue` inspection commands.

use std::fmt::Write as _;

use courier_config::CourierConfig;
use courier_core::{QueuedDelivery, RelayError};
use courier_storage::QueueStore;

/// `courier queue list`: retry-eligible records, or the most recent of any
/// status with `all`.
pub async fn run_list(
    config: &CourierConfig,
    limit: u32,
    all: bool,
    json: bool,
) -> Result<(), RelayError> {
    let store = QueueStore::open(&config.storage, &config.queue).await?;
    let records = if all {
        store.list_recent(limit).await?
    } else {
        store.select_retry_eligible(limit).await?
    };

    if json {
        println!("{}", to_json(&records)?);
    } else if records.is_empty() {
        println!("queue is empty");
    } else {
        print!("{}", render_table(&records));
    }
    store.database().clone().close().await
}

/// `courier queue show`: the latest record for one source message.
pub async fn run_show(
    config: &CourierConfig,
    chat_id: i64,
    message_id: i64,
    json: bool,
) -> Result<(), RelayError> {
    let store = QueueStore::open(&config.storage, &config.queue).await?;
    let record = store.find_by_source(message_id, chat_id).await?;

    match (record, json) {
        (Some(record), true) => println!("{}", to_json(&record)?),
        (Some(record), false) => print!("{}", render_record(&record)),
        (None, _) => println!("no queued delivery for message {message_id} in chat {chat_id}"),
    }
    store.database().clone().close().await
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, RelayError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::Internal(format!("failed to encode JSON: {e}")))
}

fn render_table(records: &[QueuedDelivery]) -> String {
    let mut out = format!(
        "{:>6}  {:>20}  {:>10}  {:<9}  {:>5}  {:<4}  {}\n",
        "ID", "CHAT", "MESSAGE", "STATUS", "TRIES", "EDIT", "CREATED"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:>6}  {:>20}  {:>10}  {:<9}  {:>5}  {:<4}  {}",
            r.id,
            r.source_chat_id,
            r.source_message_id,
            r.status,
            r.retry_count,
            if r.is_edit { "yes" } else { "no" },
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    out
}

fn render_record(r: &QueuedDelivery) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id:         {}", r.id);
    let _ = writeln!(out, "source:     chat {} message {}", r.source_chat_id, r.source_message_id);
    let _ = writeln!(out, "status:     {}", r.status);
    let _ = writeln!(out, "retries:    {}", r.retry_count);
    let _ = writeln!(out, "edit:       {}", r.is_edit);
    let _ = writeln!(out, "created:    {}", r.created_at.to_rfc3339());
    if let Some(text) = &r.text_snapshot {
        let _ = writeln!(out, "text:       {text}");
    }
    if let Some(path) = &r.media_path_snapshot {
        let _ = writeln!(out, "media:      {}", path.display());
    }
    if let Some(error) = &r.last_error {
        let _ = writeln!(out, "last error: {error}");
    }
    out
}
