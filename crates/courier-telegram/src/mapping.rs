// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion from Bot API messages into relay domain types, and source
//! chat matching.

use courier_core::{ChatKind, Media, Sender, SourceMessage};
use teloxide::types::Message;

/// Which chat counts as the relay source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilter {
    /// Numeric chat id, compared exactly.
    ChatId(i64),
    /// Public `@username` of a group or channel, compared case-insensitively.
    Username(String),
}

impl SourceFilter {
    /// Parse a configured source identifier.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => SourceFilter::ChatId(id),
            Err(_) => SourceFilter::Username(raw.trim_start_matches('@').to_string()),
        }
    }

    pub fn matches(&self, msg: &Message) -> bool {
        match self {
            SourceFilter::ChatId(id) => msg.chat.id.0 == *id,
            SourceFilter::Username(name) => msg
                .chat
                .username()
                .is_some_and(|u| u.eq_ignore_ascii_case(name)),
        }
    }
}

/// Convert a Bot API message into a [`SourceMessage`].
pub fn to_source_message(msg: &Message) -> SourceMessage {
    SourceMessage {
        id: i64::from(msg.id.0),
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind(msg),
        sender: sender(msg),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media: media(msg),
        date: msg.date,
    }
}

fn chat_kind(msg: &Message) -> ChatKind {
    if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn sender(msg: &Message) -> Option<Sender> {
    if let Some(user) = msg.from.as_ref() {
        return Some(Sender {
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        });
    }
    // Channel posts and anonymous admins speak as a chat.
    msg.sender_chat.as_ref().map(|chat| Sender {
        first_name: chat.title().map(str::to_string),
        last_name: None,
        username: chat.username().map(str::to_string),
    })
}

fn media(msg: &Message) -> Option<Media> {
    if let Some(photos) = msg.photo() {
        // Sizes are ascending; the last is the largest.
        return photos.last().map(|largest| Media::Photo {
            file_id: largest.file.id.to_string(),
        });
    }
    if let Some(doc) = msg.document() {
        return Some(Media::Document {
            file_id: doc.file.id.to_string(),
            file_name: doc.file_name.clone(),
            mime_type: doc.mime_type.as_ref().map(|m| m.to_string()),
        });
    }
    if let Some(video) = msg.video() {
        return Some(Media::Video {
            file_id: video.file.id.to_string(),
            file_name: video.file_name.clone(),
            mime_type: video.mime_type.as_ref().map(|m| m.to_string()),
        });
    }
    if let Some(animation) = msg.animation() {
        return Some(Media::Document {
            file_id: animation.file.id.to_string(),
            file_name: animation.file_name.clone(),
            mime_type: animation.mime_type.as_ref().map(|m| m.to_string()),
        });
    }
    if let Some(sticker) = msg.sticker() {
        // Stickers carry no declared MIME type; derive it from the format.
        let mime = if sticker.is_animated() {
            "application/x-tgsticker"
        } else if sticker.is_video() {
            "video/webm"
        } else {
            "image/webp"
        };
        return Some(Media::Document {
            file_id: sticker.file.id.to_string(),
            file_name: None,
            mime_type: Some(mime.to_string()),
        });
    }
    if let Some(note) = msg.video_note() {
        return Some(Media::Video {
            file_id: note.file.id.to_string(),
            file_name: None,
            mime_type: Some("video/mp4".to_string()),
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(Media::Audio {
            file_id: audio.file.id.to_string(),
            file_name: audio.file_name.clone(),
            mime_type: audio.mime_type.as_ref().map(|m| m.to_string()),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Media::Voice {
            file_id: voice.file.id.to_string(),
            mime_type: voice.mime_type.as_ref().map(|m| m.to_string()),
        });
    }
    None
}
