// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the relay pipeline, the queue store and backends.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What kind of conversation a message originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    /// One-to-one conversation.
    Private,
    /// Group or supergroup.
    Group,
    /// Broadcast channel.
    Channel,
}

impl ChatKind {
    /// Multi-party surfaces get sender attribution in relayed text.
    pub fn is_multi_party(self) -> bool {
        !matches!(self, ChatKind::Private)
    }
}

/// Sender metadata as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// Tag for the closed set of media shapes a message can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Document,
    Video,
    Audio,
    Voice,
    Webpage,
    None,
}

impl MediaKind {
    /// Extension used when nothing more specific (file name, content kind) is known.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Photo => ".jpg",
            MediaKind::Video => ".mp4",
            MediaKind::Audio => ".mp3",
            MediaKind::Voice => ".ogg",
            MediaKind::Document | MediaKind::Webpage | MediaKind::None => "",
        }
    }

    /// Whether media of this kind can be sent to the destination as a file.
    ///
    /// Webpages are only sendable through their embedded preview media.
    pub fn is_file_sendable(self) -> bool {
        matches!(
            self,
            MediaKind::Photo
                | MediaKind::Document
                | MediaKind::Video
                | MediaKind::Audio
                | MediaKind::Voice
        )
    }
}

/// Media attached to a source message.
///
/// `file_id` is the backend's opaque handle; it is only valid for the running
/// backend session, which is why media is re-downloaded on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Media {
    Photo {
        file_id: String,
    },
    Document {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Video {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Audio {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Voice {
        file_id: String,
        mime_type: Option<String>,
    },
    Webpage {
        url: String,
        preview: Option<Box<Media>>,
    },
}

impl Media {
    pub fn kind(&self) -> MediaKind {
        match self {
            Media::Photo { .. } => MediaKind::Photo,
            Media::Document { .. } => MediaKind::Document,
            Media::Video { .. } => MediaKind::Video,
            Media::Audio { .. } => MediaKind::Audio,
            Media::Voice { .. } => MediaKind::Voice,
            Media::Webpage { .. } => MediaKind::Webpage,
        }
    }

    /// Declared content kind (MIME type), if any.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Media::Document { mime_type, .. }
            | Media::Video { mime_type, .. }
            | Media::Audio { mime_type, .. }
            | Media::Voice { mime_type, .. } => mime_type.as_deref(),
            Media::Photo { .. } | Media::Webpage { .. } => None,
        }
    }

    /// Declared file name, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Media::Document { file_name, .. }
            | Media::Video { file_name, .. }
            | Media::Audio { file_name, .. } => file_name.as_deref(),
            Media::Photo { .. } | Media::Voice { .. } | Media::Webpage { .. } => None,
        }
    }

    /// The part of this media that is actually downloaded.
    ///
    /// For a webpage this is its embedded preview; for everything else the
    /// media itself.
    pub fn downloadable(&self) -> Option<&Media> {
        match self {
            Media::Webpage { preview, .. } => preview.as_deref().and_then(Media::downloadable),
            other => Some(other),
        }
    }

    /// Backend file handle of the downloadable part.
    pub fn file_id(&self) -> Option<&str> {
        match self.downloadable()? {
            Media::Photo { file_id }
            | Media::Document { file_id, .. }
            | Media::Video { file_id, .. }
            | Media::Audio { file_id, .. }
            | Media::Voice { file_id, .. } => Some(file_id),
            Media::Webpage { .. } => None,
        }
    }

    /// For webpages: whether the embedded preview is displayable media
    /// (photo, video, audio, or a document whose content kind is video/audio).
    pub fn has_displayable_preview(&self) -> bool {
        let Media::Webpage {
            preview: Some(preview),
            ..
        } = self
        else {
            return false;
        };
        match preview.as_ref() {
            Media::Photo { .. } | Media::Video { .. } | Media::Audio { .. } => true,
            Media::Document { mime_type, .. } => mime_type
                .as_deref()
                .is_some_and(|m| m.contains("video") || m.contains("audio")),
            Media::Voice { .. } | Media::Webpage { .. } => false,
        }
    }
}

/// A message observed on the source surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub id: i64,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender: Option<Sender>,
    pub text: Option<String>,
    pub media: Option<Media>,
    pub date: DateTime<Utc>,
}

impl SourceMessage {
    pub fn media_kind(&self) -> MediaKind {
        self.media.as_ref().map_or(MediaKind::None, Media::kind)
    }
}

/// An event delivered by a backend subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    NewMessage(SourceMessage),
    Edited(SourceMessage),
}

impl SourceEvent {
    pub fn message(&self) -> &SourceMessage {
        match self {
            SourceEvent::NewMessage(m) | SourceEvent::Edited(m) => m,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, SourceEvent::Edited(_))
    }
}

/// A normalized destination identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    /// `@username` handle, passed to the backend verbatim.
    Username(String),
    /// Numeric chat id in the backend's convention.
    ChatId(i64),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Username(name) => f.write_str(name),
            Destination::ChatId(id) => write!(f, "{id}"),
        }
    }
}

/// A chat the backend has resolved and can send to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChat {
    pub id: i64,
    pub title: Option<String>,
}

/// Status of a queued delivery record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Completed,
    Failed,
}

/// A durable record of a message awaiting (or having attempted) relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedDelivery {
    pub id: i64,
    pub source_message_id: i64,
    pub source_chat_id: i64,
    pub text_snapshot: Option<String>,
    pub media_path_snapshot: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub status: DeliveryStatus,
    pub last_error: Option<String>,
    pub is_edit: bool,
}

/// Fields supplied when enqueueing; the store assigns id, status and retry count.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDelivery {
    pub source_message_id: i64,
    pub source_chat_id: i64,
    pub text_snapshot: Option<String>,
    pub media_path_snapshot: Option<PathBuf>,
    pub is_edit: bool,
    pub created_at: DateTime<Utc>,
}

impl NewDelivery {
    /// Builds an enqueue request from a source message, stamped with the current time.
    pub fn from_message(message: &SourceMessage, media_path: Option<PathBuf>, is_edit: bool) -> Self {
        Self {
            source_message_id: message.id,
            source_chat_id: message.chat_id,
            text_snapshot: message.text.clone(),
            media_path_snapshot: media_path,
            is_edit,
            created_at: Utc::now(),
        }
    }
}
