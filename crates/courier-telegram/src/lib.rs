// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram Bot API backend for the Courier relay.
//!
//! Implements [`MessagingBackend`] via teloxide: long polling for source
//! events, chat lookup, file download and text/file delivery. The Bot API
//! cannot fetch history, so every observed source message is kept in an
//! in-memory LRU and the durable [`MessageArchive`] for later redrives.

pub mod cache;
pub mod error;
pub mod mapping;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_config::model::TelegramConfig;
use courier_core::{
    Destination, MediaKind, MessagingBackend, RelayError, ResolvedChat, SourceEvent,
    SourceMessage,
};
use courier_storage::MessageArchive;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InputFile, Recipient};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::MessageCache;
use crate::error::{is_chat_not_found, map_download_error, map_request_error};
use crate::mapping::{SourceFilter, to_source_message};

/// Bot API caption limit, in characters.
const MAX_CAPTION_CHARS: usize = 1024;

/// Capacity of the event channel handed to the relay.
const EVENT_BUFFER: usize = 100;

/// Source messages observed by this bot: a hot LRU over the durable archive.
#[derive(Clone)]
struct SeenMessages {
    cache: Arc<Mutex<MessageCache>>,
    archive: MessageArchive,
}

impl SeenMessages {
    async fn remember(&self, message: &SourceMessage) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(message.clone());
        }
        if let Err(e) = self.archive.save(message).await {
            warn!(
                message_id = message.id,
                chat_id = message.chat_id,
                error = %e,
                "failed to archive source message"
            );
        }
    }

    async fn recall(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<SourceMessage>, RelayError> {
        let cached = self
            .cache
            .lock()
            .map_err(|_| RelayError::Internal("message cache lock poisoned".into()))?
            .get(chat_id, message_id)
            .cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        self.archive.load(chat_id, message_id).await
    }
}

/// Telegram backend implementing [`MessagingBackend`].
pub struct TelegramBackend {
    bot: Bot,
    seen: SeenMessages,
    polling_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramBackend {
    /// Creates a backend from config. Requires `telegram.bot_token`.
    ///
    /// Observed source messages are saved to `archive` so `fetch_message`
    /// keeps answering after a restart.
    pub fn new(config: &TelegramConfig, archive: MessageArchive) -> Result<Self, RelayError> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::Config("telegram.bot_token is required".into()))?;

        let client = teloxide::net::default_reqwest_settings()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build Bot API client: {e}")))?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            seen: SeenMessages {
                cache: Arc::new(Mutex::new(MessageCache::new(config.message_cache_size))),
                archive,
            },
            polling_handle: Mutex::new(None),
        })
    }
}

impl Drop for TelegramBackend {
    fn drop(&mut self) {
        if let Ok(mut handle) = self.polling_handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

/// Shared state for the polling handlers.
struct Ingress {
    filter: SourceFilter,
    seen: SeenMessages,
    tx: mpsc::Sender<SourceEvent>,
}

impl Ingress {
    async fn forward(&self, msg: Message, edited: bool) {
        if !self.filter.matches(&msg) {
            debug!(chat_id = msg.chat.id.0, "ignoring message outside source chat");
            return;
        }

        let message = to_source_message(&msg);
        self.seen.remember(&message).await;

        let event = if edited {
            SourceEvent::Edited(message)
        } else {
            SourceEvent::NewMessage(message)
        };
        if self.tx.send(event).await.is_err() {
            warn!("event channel closed, dropping message");
        }
    }
}

#[async_trait]
impl MessagingBackend for TelegramBackend {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(&self) -> Result<(), RelayError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| map_request_error(e, "getMe"))?;
        info!(bot = %me.user.first_name, "connected to Telegram");
        Ok(())
    }

    async fn subscribe(&self, source: &str) -> Result<mpsc::Receiver<SourceEvent>, RelayError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let ingress = Arc::new(Ingress {
            filter: SourceFilter::parse(source),
            seen: self.seen.clone(),
            tx,
        });

        let bot = self.bot.clone();
        let endpoint = |edited: bool| {
            let ingress = ingress.clone();
            move |msg: Message| {
                let ingress = ingress.clone();
                async move {
                    ingress.forward(msg, edited).await;
                    respond(())
                }
            }
        };
        let handler = teloxide::dptree::entry()
            .branch(Update::filter_message().endpoint(endpoint(false)))
            .branch(Update::filter_edited_message().endpoint(endpoint(true)))
            .branch(Update::filter_channel_post().endpoint(endpoint(false)))
            .branch(Update::filter_edited_channel_post().endpoint(endpoint(true)));

        info!(source, "starting Telegram long polling");
        let handle = tokio::spawn(async move {
            Dispatcher::builder(bot, handler)
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        });

        if let Ok(mut slot) = self.polling_handle.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        Ok(rx)
    }

    async fn resolve_destination(
        &self,
        destination: &Destination,
    ) -> Result<ResolvedChat, RelayError> {
        let recipient = match destination {
            Destination::ChatId(id) => Recipient::Id(ChatId(*id)),
            Destination::Username(name) => Recipient::ChannelUsername(name.clone()),
        };
        let chat = self
            .bot
            .get_chat(recipient)
            .await
            .map_err(|e| map_request_error(e, &format!("resolve destination {destination}")))?;
        Ok(ResolvedChat {
            id: chat.id.0,
            title: None,
        })
    }

    async fn resolve_chat(&self, chat_id: i64) -> Result<Option<ResolvedChat>, RelayError> {
        match self.bot.get_chat(ChatId(chat_id)).await {
            Ok(chat) => Ok(Some(ResolvedChat {
                id: chat.id.0,
                title: None,
            })),
            Err(e) if is_chat_not_found(&e) => Ok(None),
            Err(e) => Err(map_request_error(e, "resolve source chat")),
        }
    }

    async fn fetch_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<SourceMessage>, RelayError> {
        self.seen.recall(chat_id, message_id).await
    }

    async fn send_text(&self, chat: &ResolvedChat, text: &str) -> Result<(), RelayError> {
        self.bot
            .send_message(Recipient::Id(ChatId(chat.id)), text)
            .await
            .map_err(|e| map_request_error(e, "sendMessage"))?;
        Ok(())
    }

    async fn send_file(
        &self,
        chat: &ResolvedChat,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), RelayError> {
        let to = Recipient::Id(ChatId(chat.id));
        let input = InputFile::file(path.to_path_buf());
        let full_text = caption;
        let overflow = full_text.chars().count() > MAX_CAPTION_CHARS;
        let caption = (!full_text.trim().is_empty() && !overflow).then(|| full_text.to_string());

        macro_rules! send {
            ($method:ident, $name:literal) => {{
                let mut request = self.bot.$method(to.clone(), input);
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                request
                    .await
                    .map(|_| ())
                    .map_err(|e| map_request_error(e, $name))
            }};
        }

        match SendMethod::for_kind(kind) {
            SendMethod::Photo => send!(send_photo, "sendPhoto"),
            SendMethod::Video => send!(send_video, "sendVideo"),
            SendMethod::Audio => send!(send_audio, "sendAudio"),
            SendMethod::Voice => send!(send_voice, "sendVoice"),
            SendMethod::Document => send!(send_document, "sendDocument"),
        }?;

        if overflow {
            debug!(chat_id = chat.id, "caption too long, sending text separately");
            self.send_text(chat, full_text).await?;
        }
        Ok(())
    }

    async fn download_media(&self, message: &SourceMessage, dest: &Path) -> Result<(), RelayError> {
        let file_id = message
            .media
            .as_ref()
            .and_then(|m| m.file_id())
            .ok_or_else(|| RelayError::media(format!("message {} has no file", message.id)))?;

        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| match map_request_error(e, "getFile") {
                RelayError::RateLimited { retry_after } => RelayError::RateLimited { retry_after },
                other => RelayError::MediaAcquisitionFailed {
                    message: other.to_string(),
                    source: Some(Box::new(other)),
                },
            })?;

        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| RelayError::MediaAcquisitionFailed {
                message: format!("failed to create {}: {e}", dest.display()),
                source: Some(Box::new(e)),
            })?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| map_download_error(e, "download file"))?;
        out.flush()
            .await
            .map_err(|e| RelayError::MediaAcquisitionFailed {
                message: format!("failed to flush {}: {e}", dest.display()),
                source: Some(Box::new(e)),
            })?;

        debug!(msg_id = message.id, bytes = file.size, path = %dest.display(), "downloaded media");
        Ok(())
    }
}

/// Which Bot API send method a file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendMethod {
    Photo,
    Video,
    Audio,
    Voice,
    Document,
}

impl SendMethod {
    fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Photo => SendMethod::Photo,
            MediaKind::Video => SendMethod::Video,
            MediaKind::Audio => SendMethod::Audio,
            MediaKind::Voice => SendMethod::Voice,
            MediaKind::Document | MediaKind::Webpage | MediaKind::None => SendMethod::Document,
        }
    }
}
