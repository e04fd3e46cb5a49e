// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging backend trait: the opaque client capability the relay drives.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::types::{Destination, MediaKind, ResolvedChat, SourceEvent, SourceMessage};

/// Client capability for the messaging network the relay reads from and writes to.
///
/// Implementations map their wire errors onto [`RelayError`]: rate-limit
/// signals must surface as [`RelayError::RateLimited`] so the delivery
/// executor can back off, refusals as [`RelayError::DeliveryRejected`], and
/// everything transient as [`RelayError::Backend`]. Every network call is
/// expected to carry its own timeout.
#[async_trait]
pub trait MessagingBackend: Send + Sync + 'static {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &str;

    /// Establishes the session with the backend and validates credentials.
    async fn connect(&self) -> Result<(), RelayError>;

    /// Subscribes to new and edited messages on the given source surface.
    ///
    /// The receiver yields events in arrival order and closes when the
    /// backend disconnects.
    async fn subscribe(&self, source: &str) -> Result<mpsc::Receiver<SourceEvent>, RelayError>;

    /// Resolves a destination into a chat the backend can send to.
    async fn resolve_destination(&self, destination: &Destination)
    -> Result<ResolvedChat, RelayError>;

    /// Looks up a source chat by id. `Ok(None)` means the chat is gone.
    async fn resolve_chat(&self, chat_id: i64) -> Result<Option<ResolvedChat>, RelayError>;

    /// Re-fetches a message by id. `Ok(None)` means the message is gone.
    async fn fetch_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<SourceMessage>, RelayError>;

    /// Sends a plain text message.
    async fn send_text(&self, chat: &ResolvedChat, text: &str) -> Result<(), RelayError>;

    /// Sends a local file with a caption, presented as `kind` (the kind of the
    /// source media it was downloaded from).
    async fn send_file(
        &self,
        chat: &ResolvedChat,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), RelayError>;

    /// Downloads the message's media (or its link-preview media) to `dest`.
    async fn download_media(&self, message: &SourceMessage, dest: &Path) -> Result<(), RelayError>;
}
