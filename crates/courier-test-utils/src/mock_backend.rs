// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging backend for deterministic testing.
//!
//! `MockBackend` implements `MessagingBackend` with injectable source events,
//! scripted send failures, and captured outbound deliveries for assertion.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use courier_core::{
    Destination, MediaKind, MessagingBackend, RelayError, ResolvedChat, SourceEvent, SourceMessage,
};

/// Destination chat id reported for `@username` destinations.
pub const MOCK_USERNAME_CHAT_ID: i64 = -100999;

/// One delivery captured by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentItem {
    Text {
        chat_id: i64,
        text: String,
    },
    File {
        chat_id: i64,
        path: PathBuf,
        kind: MediaKind,
        caption: String,
        /// File size at send time; the relay deletes the file afterwards.
        size: u64,
    },
}

impl SentItem {
    /// Text body or caption.
    pub fn text(&self) -> &str {
        match self {
            SentItem::Text { text, .. } => text,
            SentItem::File { caption, .. } => caption,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SentItem::File { .. })
    }
}

type ErrorFactory = Box<dyn Fn() -> RelayError + Send + Sync>;

/// A mock messaging backend for testing.
///
/// - **events**: injected via [`MockBackend::inject`], delivered to the subscriber
/// - **sent**: every successful `send_text`/`send_file`, retrievable via [`MockBackend::sent`]
/// - **failures**: queued with [`MockBackend::fail_next_send`] or made permanent
///   with [`MockBackend::fail_all_sends`]
pub struct MockBackend {
    sent: Arc<Mutex<Vec<SentItem>>>,
    send_failures: Mutex<VecDeque<RelayError>>,
    always_fail: std::sync::Mutex<Option<ErrorFactory>>,
    subscriber: Mutex<Option<mpsc::Sender<SourceEvent>>>,
    messages: Mutex<HashMap<(i64, i64), SourceMessage>>,
    chats: Mutex<HashMap<i64, ResolvedChat>>,
    media_bytes: Mutex<Option<Vec<u8>>>,
    destination_missing: std::sync::atomic::AtomicBool,
    send_attempts: AtomicUsize,
    downloads: AtomicUsize,
}

impl MockBackend {
    /// A backend that accepts every send and downloads five bytes of media.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            send_failures: Mutex::new(VecDeque::new()),
            always_fail: std::sync::Mutex::new(None),
            subscriber: Mutex::new(None),
            messages: Mutex::new(HashMap::new()),
            chats: Mutex::new(HashMap::new()),
            media_bytes: Mutex::new(Some(b"media".to_vec())),
            destination_missing: std::sync::atomic::AtomicBool::new(false),
            send_attempts: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Deliver an event to the active subscription.
    ///
    /// Panics if nothing has subscribed yet.
    pub async fn inject(&self, event: SourceEvent) {
        let sender = self
            .subscriber
            .lock()
            .await
            .clone()
            .expect("inject called before subscribe");
        sender.send(event).await.expect("subscriber dropped");
    }

    /// Close the event stream, as a backend disconnect would.
    pub async fn disconnect(&self) {
        self.subscriber.lock().await.take();
    }

    /// Make a message (and its chat) available to `fetch_message`/`resolve_chat`.
    pub async fn store_message(&self, message: SourceMessage) {
        self.chats.lock().await.insert(
            message.chat_id,
            ResolvedChat {
                id: message.chat_id,
                title: Some("Source".into()),
            },
        );
        self.messages
            .lock()
            .await
            .insert((message.chat_id, message.id), message);
    }

    /// Forget a chat so `resolve_chat` reports it missing.
    pub async fn remove_chat(&self, chat_id: i64) {
        self.chats.lock().await.remove(&chat_id);
    }

    /// Queue an error for the next send attempt only.
    pub async fn fail_next_send(&self, error: RelayError) {
        self.send_failures.lock().await.push_back(error);
    }

    /// Fail every send with a fresh error from `factory` until cleared.
    pub fn fail_all_sends(&self, factory: impl Fn() -> RelayError + Send + Sync + 'static) {
        if let Ok(mut slot) = self.always_fail.lock() {
            *slot = Some(Box::new(factory));
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut slot) = self.always_fail.lock() {
            *slot = None;
        }
    }

    /// Bytes written by `download_media`; `None` makes downloads fail.
    pub async fn set_media_bytes(&self, bytes: Option<Vec<u8>>) {
        *self.media_bytes.lock().await = bytes;
    }

    pub fn set_destination_missing(&self, missing: bool) {
        self.destination_missing.store(missing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentItem> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every send call, including failed ones.
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    async fn next_failure(&self) -> Option<RelayError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_failures.lock().await.pop_front() {
            return Some(err);
        }
        self.always_fail
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|factory| factory()))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn subscribe(&self, _source: &str) -> Result<mpsc::Receiver<SourceEvent>, RelayError> {
        let (tx, rx) = mpsc::channel(64);
        *self.subscriber.lock().await = Some(tx);
        Ok(rx)
    }

    async fn resolve_destination(
        &self,
        destination: &Destination,
    ) -> Result<ResolvedChat, RelayError> {
        if self.destination_missing.load(Ordering::SeqCst) {
            return Err(RelayError::rejected(format!(
                "destination {destination} not found"
            )));
        }
        let id = match destination {
            Destination::ChatId(id) => *id,
            Destination::Username(_) => MOCK_USERNAME_CHAT_ID,
        };
        Ok(ResolvedChat {
            id,
            title: Some("Mock Destination".into()),
        })
    }

    async fn resolve_chat(&self, chat_id: i64) -> Result<Option<ResolvedChat>, RelayError> {
        Ok(self.chats.lock().await.get(&chat_id).cloned())
    }

    async fn fetch_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<SourceMessage>, RelayError> {
        Ok(self
            .messages
            .lock()
            .await
            .get(&(chat_id, message_id))
            .cloned())
    }

    async fn send_text(&self, chat: &ResolvedChat, text: &str) -> Result<(), RelayError> {
        if let Some(err) = self.next_failure().await {
            return Err(err);
        }
        self.sent.lock().await.push(SentItem::Text {
            chat_id: chat.id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_file(
        &self,
        chat: &ResolvedChat,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), RelayError> {
        if let Some(err) = self.next_failure().await {
            return Err(err);
        }
        let size = tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .map_err(|e| RelayError::Backend {
                message: format!("cannot read {}", path.display()),
                source: Some(Box::new(e)),
            })?;
        self.sent.lock().await.push(SentItem::File {
            chat_id: chat.id,
            path: path.to_path_buf(),
            kind,
            caption: caption.to_string(),
            size,
        });
        Ok(())
    }

    async fn download_media(&self, message: &SourceMessage, dest: &Path) -> Result<(), RelayError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .media_bytes
            .lock()
            .await
            .clone()
            .ok_or_else(|| RelayError::media(format!("download of message {} failed", message.id)))?;
        tokio::fs::write(dest, bytes)
            .await
            .map_err(|e| RelayError::MediaAcquisitionFailed {
                message: format!("cannot write {}", dest.display()),
                source: Some(Box::new(e)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn chat() -> ResolvedChat {
        ResolvedChat {
            id: -100,
            title: None,
        }
    }

    #[tokio::test]
    async fn captures_text_sends() {
        let backend = MockBackend::new();
        backend.send_text(&chat(), "hello").await.unwrap();
        let sent = backend.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text(), "hello");
        assert!(!sent[0].is_file());
    }

    #[tokio::test]
    async fn scripted_failure_applies_once() {
        let backend = MockBackend::new();
        backend
            .fail_next_send(RelayError::RateLimited { retry_after: None })
            .await;
        assert!(backend.send_text(&chat(), "a").await.is_err());
        assert!(backend.send_text(&chat(), "b").await.is_ok());
        assert_eq!(backend.send_attempts(), 2);
        assert_eq!(backend.sent_count().await, 1);
    }

    #[tokio::test]
    async fn permanent_failure_until_cleared() {
        let backend = MockBackend::new();
        backend.fail_all_sends(|| RelayError::backend("down"));
        assert!(backend.send_text(&chat(), "a").await.is_err());
        assert!(backend.send_text(&chat(), "a").await.is_err());
        backend.clear_failures();
        assert!(backend.send_text(&chat(), "a").await.is_ok());
    }

    #[tokio::test]
    async fn injected_events_reach_subscriber() {
        let backend = MockBackend::new();
        let mut rx = backend.subscribe("@src").await.unwrap();
        backend
            .inject(SourceEvent::NewMessage(fixtures::private_text(1, "hi")))
            .await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.message().id, 1);
        backend.disconnect().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn download_writes_configured_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("m.jpg");
        let backend = MockBackend::new();
        let msg = fixtures::private_text(1, "x");
        backend.download_media(&msg, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"media");

        backend.set_media_bytes(None).await;
        assert!(backend.download_media(&msg, &dest).await.is_err());
        assert_eq!(backend.downloads(), 2);
    }
}
