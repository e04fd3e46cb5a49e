// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical outbound text.
//!
//! Multi-party origin gets a `From: <label>` header; one-to-one text passes
//! through unchanged. Edits carry a UTC timestamp annotation.

use chrono::{DateTime, Utc};
use courier_core::{Sender, SourceMessage};

const UNKNOWN_SENDER: &str = "Unknown Sender";

/// Format with the current time as the edit timestamp.
pub fn format(message: &SourceMessage, is_edit: bool) -> String {
    format_at(message, is_edit, Utc::now())
}

/// Format with an explicit edit timestamp.
pub fn format_at(message: &SourceMessage, is_edit: bool, now: DateTime<Utc>) -> String {
    let text = message.text.as_deref().unwrap_or_default();
    let annotation = is_edit.then(|| edit_annotation(now));

    if !message.chat_kind.is_multi_party() {
        return match annotation {
            Some(note) if text.is_empty() => note,
            Some(note) => format!("{text}\n\n{note}"),
            None => text.to_string(),
        };
    }

    let mut out = format!("From: {}\n", sender_label(message.sender.as_ref()));
    if let Some(note) = annotation {
        out.push_str(&note);
        out.push('\n');
    }
    if !text.is_empty() {
        out.push('\n');
        out.push_str(text);
    }
    out
}

/// `First Last (@username)`, with missing parts left out.
pub fn sender_label(sender: Option<&Sender>) -> String {
    let Some(sender) = sender else {
        return UNKNOWN_SENDER.to_string();
    };

    let name = [sender.first_name.as_deref(), sender.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let handle = sender
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| format!("(@{u})"));

    match (name.is_empty(), handle) {
        (true, None) => UNKNOWN_SENDER.to_string(),
        (true, Some(handle)) => handle,
        (false, None) => name,
        (false, Some(handle)) => format!("{name} {handle}"),
    }
}

fn edit_annotation(now: DateTime<Utc>) -> String {
    format!("[edited {}]", now.format("%Y-%m-%d %H:%M:%S UTC"))
}
