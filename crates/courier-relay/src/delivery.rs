// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery executor: formats a message and sends it to the destination,
//! retrying the whole attempt with exponential backoff when rate-limited.
//!
//! Never touches the queue; callers decide what a failure means.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use courier_config::model::DeliveryConfig;
use courier_core::{Destination, MediaKind, MessagingBackend, RelayError, SourceMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::format;

/// Exponential backoff for rate-limit retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay_ms, config.max_delay_ms)
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failure (0-based): `base * 2^attempt`
    /// capped at `max_delay`, or the server hint if that is longer.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let shift = attempt.min(20);
        let calculated = self
            .base_delay_ms
            .saturating_mul(1_u64 << shift)
            .min(self.max_delay_ms);
        let hinted = retry_after.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Duration::from_millis(calculated.max(hinted))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

/// Sends formatted messages to the configured destination.
pub struct Deliverer {
    backend: Arc<dyn MessagingBackend>,
    destination: Destination,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Deliverer {
    pub fn new(
        backend: Arc<dyn MessagingBackend>,
        destination: Destination,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            destination,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort backoff sleeps when `cancel` fires; [`RelayError::Cancelled`] is
    /// returned instead of retrying.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deliver `message`, attaching `media_path` when it is usable.
    pub async fn deliver(
        &self,
        message: &SourceMessage,
        media_path: Option<&Path>,
        is_edit: bool,
    ) -> Result<(), RelayError> {
        let text = format::format(message, is_edit);
        let file = usable_file(message, media_path).await;

        if file.is_none() && text.trim().is_empty() {
            warn!(message_id = message.id, "nothing to relay: no text and no usable media");
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.attempt(&text, file).await {
                Ok(()) => {
                    debug!(
                        message_id = message.id,
                        destination = %self.destination,
                        with_file = file.is_some(),
                        "message relayed"
                    );
                    return Ok(());
                }
                Err(RelayError::RateLimited { retry_after })
                    if attempt + 1 < self.policy.max_attempts =>
                {
                    let delay = self.policy.delay_for_attempt(attempt, retry_after);
                    attempt += 1;
                    warn!(
                        message_id = message.id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "rate limited, backing off"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!(message_id = message.id, attempt, "backoff interrupted by shutdown");
                            return Err(RelayError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        text: &str,
        file: Option<(&Path, MediaKind)>,
    ) -> Result<(), RelayError> {
        let chat = self.backend.resolve_destination(&self.destination).await?;
        match file {
            Some((path, kind)) => self.backend.send_file(&chat, path, kind, text).await,
            None => self.backend.send_text(&chat, text).await,
        }
    }
}

/// The file to attach and the kind it is sent as, if the message's media
/// allows one and the local copy exists and is non-empty.
async fn usable_file<'a>(
    message: &SourceMessage,
    media_path: Option<&'a Path>,
) -> Option<(&'a Path, MediaKind)> {
    let media = message.media.as_ref()?;
    let kind = media.kind();
    let send_as = media.downloadable()?.kind();

    if kind == MediaKind::Webpage {
        if !media.has_displayable_preview() {
            return None;
        }
    } else if !kind.is_file_sendable() {
        return None;
    }

    let path = media_path?;
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Some((path, send_as)),
        Ok(_) => {
            warn!(message_id = message.id, path = %path.display(), "media file is empty, sending text only");
            None
        }
        Err(_) => {
            warn!(message_id = message.id, path = %path.display(), "media file is missing, sending text only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Media;
    use courier_test_utils::{MockBackend, SentItem, fixtures};
    use tempfile::TempDir;

    const DEST: i64 = -100123456789;

    fn deliverer(backend: &Arc<MockBackend>) -> Deliverer {
        Deliverer::new(
            backend.clone(),
            Destination::ChatId(DEST),
            RetryPolicy::new(5, 1_000, 60_000),
        )
    }

    fn media_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 1_000, 60_000);
        assert_eq!(policy.delay_for_attempt(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3, None), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(10, None), Duration::from_secs(60));
    }

    #[test]
    fn larger_retry_after_hint_wins() {
        let policy = RetryPolicy::new(5, 1_000, 60_000);
        assert_eq!(
            policy.delay_for_attempt(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for_attempt(4, Some(Duration::from_secs(2))),
            Duration::from_secs(16)
        );
        assert_eq!(
            policy.delay_for_attempt(0, Some(Duration::from_secs(120))),
            Duration::from_secs(120)
        );
    }

    #[tokio::test]
    async fn text_message_never_sends_file() {
        let dir = tempfile::tempdir().unwrap();
        let stray = media_file(&dir, "stray.jpg", b"data");
        let backend = Arc::new(MockBackend::new());
        let msg = fixtures::private_text(1, "hello");

        deliverer(&backend)
            .deliver(&msg, Some(&stray), false)
            .await
            .unwrap();

        let sent = backend.sent().await;
        assert_eq!(
            sent,
            vec![SentItem::Text {
                chat_id: DEST,
                text: "hello".into()
            }]
        );
    }

    #[tokio::test]
    async fn media_with_file_sends_file_with_caption() {
        let dir = tempfile::tempdir().unwrap();
        let path = media_file(&dir, "media_1.jpg", b"jpegdata");
        let backend = Arc::new(MockBackend::new());
        let msg = fixtures::with_media(fixtures::group_text(1, "look"), fixtures::photo("p"));

        deliverer(&backend)
            .deliver(&msg, Some(&path), false)
            .await
            .unwrap();

        let sent = backend.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_file());
        assert_eq!(sent[0].text(), "From: Ann (@ann99)\n\nlook");
    }

    #[tokio::test]
    async fn file_is_sent_as_the_kind_of_its_source_media() {
        let dir = tempfile::tempdir().unwrap();
        let path = media_file(&dir, "media_1.bin", b"frames");
        let backend = Arc::new(MockBackend::new());
        let video = Media::Video {
            file_id: "v".into(),
            file_name: None,
            mime_type: None,
        };
        let msg = fixtures::with_media(fixtures::private_text(1, "clip"), video);

        deliverer(&backend)
            .deliver(&msg, Some(&path), false)
            .await
            .unwrap();

        let sent = backend.sent().await;
        assert!(matches!(
            &sent[0],
            SentItem::File { kind: MediaKind::Video, .. }
        ));
    }

    #[tokio::test]
    async fn webpage_preview_is_sent_as_the_preview_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = media_file(&dir, "media_1.mp4", b"frames");
        let backend = Arc::new(MockBackend::new());
        let preview = fixtures::document("d", Some("clip.mp4"), Some("video/mp4"));
        let page = fixtures::webpage("https://x.test", Some(preview));
        let msg = fixtures::with_media(fixtures::private_text(1, "https://x.test"), page);

        deliverer(&backend)
            .deliver(&msg, Some(&path), false)
            .await
            .unwrap();

        let sent = backend.sent().await;
        assert!(matches!(
            &sent[0],
            SentItem::File { kind: MediaKind::Document, .. }
        ));
    }

    #[tokio::test]
    async fn zero_length_media_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = media_file(&dir, "media_1.jpg", b"");
        let backend = Arc::new(MockBackend::new());
        let msg = fixtures::with_media(fixtures::private_text(1, "caption"), fixtures::photo("p"));

        deliverer(&backend)
            .deliver(&msg, Some(&path), false)
            .await
            .unwrap();

        let sent = backend.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].is_file());
        assert_eq!(sent[0].text(), "caption");
    }

    #[tokio::test]
    async fn missing_media_file_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let msg = fixtures::with_media(fixtures::private_text(1, "caption"), fixtures::photo("p"));

        deliverer(&backend)
            .deliver(&msg, Some(&dir.path().join("gone.jpg")), false)
            .await
            .unwrap();
        assert!(!backend.sent().await[0].is_file());
    }

    #[tokio::test]
    async fn webpage_with_photo_preview_sends_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = media_file(&dir, "media_1.jpg", b"img");
        let backend = Arc::new(MockBackend::new());
        let page = fixtures::webpage("https://x.test", Some(fixtures::photo("p")));
        let msg = fixtures::with_media(fixtures::private_text(1, "https://x.test"), page);

        deliverer(&backend)
            .deliver(&msg, Some(&path), false)
            .await
            .unwrap();
        assert!(backend.sent().await[0].is_file());
    }

    #[tokio::test]
    async fn webpage_with_pdf_preview_sends_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = media_file(&dir, "media_1.pdf", b"%PDF");
        let backend = Arc::new(MockBackend::new());
        let preview = fixtures::document("d", Some("a.pdf"), Some("application/pdf"));
        let page = fixtures::webpage("https://x.test", Some(preview));
        let msg = fixtures::with_media(fixtures::private_text(1, "https://x.test"), page);

        deliverer(&backend)
            .deliver(&msg, Some(&path), false)
            .await
            .unwrap();
        assert!(!backend.sent().await[0].is_file());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_retries_then_succeeds() {
        let backend = Arc::new(MockBackend::new());
        backend
            .fail_next_send(RelayError::RateLimited { retry_after: None })
            .await;
        backend
            .fail_next_send(RelayError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            })
            .await;

        let start = tokio::time::Instant::now();
        deliverer(&backend)
            .deliver(&fixtures::private_text(1, "hi"), None, false)
            .await
            .unwrap();

        // 1s (attempt 0) + max(2s, 5s hint) (attempt 1).
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(backend.send_attempts(), 3);
        assert_eq!(backend.sent_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhaustion_surfaces_after_five_attempts() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_all_sends(|| RelayError::RateLimited { retry_after: None });

        let err = deliverer(&backend)
            .deliver(&fixtures::private_text(1, "hi"), None, false)
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(backend.send_attempts(), 5);
    }

    #[tokio::test]
    async fn other_errors_surface_immediately() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_all_sends(|| RelayError::rejected("chat not found"));

        let err = deliverer(&backend)
            .deliver(&fixtures::private_text(1, "hi"), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DeliveryRejected { .. }));
        assert_eq!(backend.send_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_all_sends(|| RelayError::RateLimited { retry_after: None });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = deliverer(&backend)
            .with_cancellation(cancel)
            .deliver(&fixtures::private_text(1, "hi"), None, false)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(backend.send_attempts(), 1);
    }

    #[tokio::test]
    async fn edit_flag_reaches_the_formatter() {
        let backend = Arc::new(MockBackend::new());
        deliverer(&backend)
            .deliver(&fixtures::private_text(1, "v2"), None, true)
            .await
            .unwrap();
        let sent = backend.sent().await;
        assert!(sent[0].text().starts_with("v2\n\n[edited "));
    }

    #[tokio::test]
    async fn empty_message_is_skipped() {
        let backend = Arc::new(MockBackend::new());
        let mut msg = fixtures::private_text(1, "");
        msg.text = None;
        deliverer(&backend).deliver(&msg, None, false).await.unwrap();
        assert_eq!(backend.send_attempts(), 0);
    }
}
