// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for source messages used across crate tests.

use chrono::{TimeZone, Utc};
use courier_core::{ChatKind, Media, Sender, SourceMessage};

/// Chat id used by fixtures unless a test overrides it.
pub const SOURCE_CHAT_ID: i64 = -1001234567890;

/// A one-to-one text message.
pub fn private_text(id: i64, text: &str) -> SourceMessage {
    SourceMessage {
        id,
        chat_id: SOURCE_CHAT_ID,
        chat_kind: ChatKind::Private,
        sender: None,
        text: Some(text.to_string()),
        media: None,
        date: Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).single().unwrap_or_default(),
    }
}

/// A group text message from `Ann (@ann99)`.
pub fn group_text(id: i64, text: &str) -> SourceMessage {
    SourceMessage {
        chat_kind: ChatKind::Group,
        sender: Some(ann()),
        ..private_text(id, text)
    }
}

pub fn ann() -> Sender {
    Sender {
        first_name: Some("Ann".into()),
        last_name: None,
        username: Some("ann99".into()),
    }
}

/// Attach media to any message.
pub fn with_media(mut message: SourceMessage, media: Media) -> SourceMessage {
    message.media = Some(media);
    message
}

pub fn photo(file_id: &str) -> Media {
    Media::Photo {
        file_id: file_id.to_string(),
    }
}

pub fn document(file_id: &str, file_name: Option<&str>, mime_type: Option<&str>) -> Media {
    Media::Document {
        file_id: file_id.to_string(),
        file_name: file_name.map(String::from),
        mime_type: mime_type.map(String::from),
    }
}

pub fn webpage(url: &str, preview: Option<Media>) -> Media {
    Media::Webpage {
        url: url.to_string(),
        preview: preview.map(Box::new),
    }
}
