// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media lifecycle: download into a scoped temp directory, classify, clean up.
//!
//! Every acquired file is owned by a [`MediaLease`], which deletes it on drop.
//! The directory itself is created lazily and removed on clean shutdown.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_core::{Media, MediaKind, MessagingBackend, RelayError, SourceMessage};
use tracing::{debug, error, warn};

/// File extension (with leading dot) for a piece of media, or `""` when
/// nothing identifies the type.
///
/// A declared file name wins, then the content kind, then the per-kind
/// default from [`MediaKind::default_extension`].
pub fn extension_for(media: &Media) -> String {
    let fallback = media.kind().default_extension();
    match media {
        Media::Photo { .. } | Media::Voice { .. } => fallback.to_string(),
        Media::Document {
            file_name,
            mime_type,
            ..
        } => file_name
            .as_deref()
            .and_then(file_name_extension)
            .unwrap_or_else(|| document_extension(mime_type.as_deref()).to_string()),
        Media::Video { file_name, .. } => file_name
            .as_deref()
            .and_then(file_name_extension)
            .unwrap_or_else(|| fallback.to_string()),
        Media::Audio {
            file_name,
            mime_type,
            ..
        } => file_name
            .as_deref()
            .and_then(file_name_extension)
            .unwrap_or_else(|| audio_extension(mime_type.as_deref()).to_string()),
        Media::Webpage { preview, .. } => preview
            .as_deref()
            .map(extension_for)
            .unwrap_or_default(),
    }
}

fn file_name_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
}

fn document_extension(mime: Option<&str>) -> &'static str {
    let Some(mime) = mime else {
        return MediaKind::Document.default_extension();
    };
    match mime {
        m if m.contains("image/webp") => ".webp",
        m if m.contains("image/jpeg") => ".jpg",
        m if m.contains("image/png") => ".png",
        m if m.contains("application/x-tgsticker") => ".tgs",
        m if m.contains("video/webm") => ".webm",
        m if m.contains("video") => MediaKind::Video.default_extension(),
        m if m.contains("audio") => audio_extension(Some(m)),
        m if m.starts_with("image/") => MediaKind::Photo.default_extension(),
        _ => MediaKind::Document.default_extension(),
    }
}

fn audio_extension(mime: Option<&str>) -> &'static str {
    if mime.is_some_and(|m| m.contains("ogg")) {
        MediaKind::Voice.default_extension()
    } else {
        MediaKind::Audio.default_extension()
    }
}

/// Owns one downloaded media file and deletes it when dropped.
#[derive(Debug)]
pub struct MediaLease {
    path: PathBuf,
}

impl MediaLease {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MediaLease {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "media released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove media file"),
        }
    }
}

/// Which pipeline a download is for; keeps live and redrive files apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Live,
    Redrive,
}

impl Purpose {
    fn file_prefix(self) -> &'static str {
        match self {
            Purpose::Live => "media_",
            Purpose::Redrive => "media_queued_",
        }
    }
}

/// Downloads message media through the backend into a temp directory.
#[derive(Clone)]
pub struct MediaManager {
    dir: PathBuf,
    backend: Arc<dyn MessagingBackend>,
}

impl MediaManager {
    pub fn new(dir: impl Into<PathBuf>, backend: Arc<dyn MessagingBackend>) -> Self {
        Self {
            dir: dir.into(),
            backend,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the temp directory if it is missing.
    pub async fn ensure_dir(&self) -> Result<(), RelayError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RelayError::MediaAcquisitionFailed {
                message: format!("cannot create media directory {}", self.dir.display()),
                source: Some(Box::new(e)),
            })
    }

    /// Target path for a message's media, or `None` if it carries nothing
    /// downloadable.
    pub fn path_for(&self, message: &SourceMessage, purpose: Purpose) -> Option<PathBuf> {
        let media = message.media.as_ref()?;
        media.file_id()?;
        Some(self.dir.join(format!(
            "{}{}{}",
            purpose.file_prefix(),
            message.id,
            extension_for(media)
        )))
    }

    /// Live-path acquisition. Failures are logged and yield `None`, so the
    /// caller proceeds text-only.
    pub async fn acquire(&self, message: &SourceMessage) -> Option<MediaLease> {
        match self.download(message, Purpose::Live).await {
            Ok(lease) => lease,
            Err(e) => {
                error!(message_id = message.id, error = %e, "media download failed");
                None
            }
        }
    }

    /// Redrive acquisition. A failed download, or a missing or empty file
    /// afterwards, is an error.
    pub async fn acquire_strict(
        &self,
        message: &SourceMessage,
    ) -> Result<Option<MediaLease>, RelayError> {
        let Some(lease) = self.download(message, Purpose::Redrive).await? else {
            return Ok(None);
        };
        match tokio::fs::metadata(lease.path()).await {
            Ok(meta) if meta.len() > 0 => Ok(Some(lease)),
            Ok(_) => Err(RelayError::media(format!(
                "downloaded media for message {} is empty",
                message.id
            ))),
            Err(e) => Err(RelayError::MediaAcquisitionFailed {
                message: format!("downloaded media for message {} is missing", message.id),
                source: Some(Box::new(e)),
            }),
        }
    }

    async fn download(
        &self,
        message: &SourceMessage,
        purpose: Purpose,
    ) -> Result<Option<MediaLease>, RelayError> {
        let Some(path) = self.path_for(message, purpose) else {
            return Ok(None);
        };
        self.ensure_dir().await?;

        // Lease before downloading so a partial file is removed on failure.
        let lease = MediaLease { path };
        self.backend.download_media(message, lease.path()).await?;
        debug!(message_id = message.id, path = %lease.path().display(), "media downloaded");
        Ok(Some(lease))
    }

    /// Remove the whole temp directory.
    pub async fn purge_all(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "media directory removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "failed to remove media directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_utils::{MockBackend, fixtures};

    fn manager(dir: &Path) -> (MediaManager, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        let media = MediaManager::new(dir.join("media"), backend.clone());
        (media, backend)
    }

    #[test]
    fn extension_table() {
        assert_eq!(extension_for(&fixtures::photo("p")), ".jpg");
        assert_eq!(
            extension_for(&fixtures::document("d", Some("report.pdf"), Some("image/png"))),
            ".pdf"
        );
        let by_mime = |mime: &str| extension_for(&fixtures::document("d", None, Some(mime)));
        assert_eq!(by_mime("image/webp"), ".webp");
        assert_eq!(by_mime("image/jpeg"), ".jpg");
        assert_eq!(by_mime("image/png"), ".png");
        assert_eq!(by_mime("application/x-tgsticker"), ".tgs");
        assert_eq!(by_mime("video/webm"), ".webm");
        assert_eq!(by_mime("video/quicktime"), ".mp4");
        assert_eq!(by_mime("audio/mpeg"), ".mp3");
        assert_eq!(by_mime("audio/ogg"), ".ogg");
        assert_eq!(by_mime("image/gif"), ".jpg");
        assert_eq!(by_mime("application/zip"), "");
        assert_eq!(extension_for(&fixtures::document("d", None, None)), "");
        assert_eq!(
            extension_for(&Media::Voice {
                file_id: "v".into(),
                mime_type: None
            }),
            ".ogg"
        );
        assert_eq!(
            extension_for(&Media::Video {
                file_id: "v".into(),
                file_name: None,
                mime_type: None
            }),
            ".mp4"
        );
        assert_eq!(
            extension_for(&Media::Audio {
                file_id: "a".into(),
                file_name: Some("song.flac".into()),
                mime_type: None
            }),
            ".flac"
        );
    }

    #[test]
    fn fallbacks_come_from_the_kind_table() {
        for media in [
            fixtures::photo("p"),
            fixtures::document("d", None, None),
            Media::Voice {
                file_id: "v".into(),
                mime_type: None,
            },
            Media::Video {
                file_id: "v".into(),
                file_name: None,
                mime_type: None,
            },
            Media::Audio {
                file_id: "a".into(),
                file_name: None,
                mime_type: None,
            },
        ] {
            assert_eq!(extension_for(&media), media.kind().default_extension());
        }
    }

    #[test]
    fn webpage_uses_preview_extension() {
        let page = fixtures::webpage("https://x.test", Some(fixtures::photo("p")));
        assert_eq!(extension_for(&page), ".jpg");
        assert_eq!(extension_for(&fixtures::webpage("https://x.test", None)), "");
    }

    #[tokio::test]
    async fn no_media_means_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let (media, backend) = manager(dir.path());
        let msg = fixtures::private_text(1, "hello");

        assert!(media.acquire(&msg).await.is_none());
        assert_eq!(backend.downloads(), 0);
        assert!(!media.dir().exists());
    }

    #[tokio::test]
    async fn acquire_creates_dir_and_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let (media, _backend) = manager(dir.path());
        let msg = fixtures::with_media(fixtures::private_text(42, ""), fixtures::photo("p"));

        let lease = media.acquire(&msg).await.unwrap();
        assert_eq!(lease.path(), media.dir().join("media_42.jpg"));
        assert!(lease.path().exists());

        let path = lease.path().to_path_buf();
        drop(lease);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn live_download_failure_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let (media, backend) = manager(dir.path());
        backend.set_media_bytes(None).await;
        let msg = fixtures::with_media(fixtures::private_text(1, ""), fixtures::photo("p"));
        assert!(media.acquire(&msg).await.is_none());
    }

    #[tokio::test]
    async fn strict_acquire_rejects_empty_download() {
        let dir = tempfile::tempdir().unwrap();
        let (media, backend) = manager(dir.path());
        backend.set_media_bytes(Some(Vec::new())).await;
        let msg = fixtures::with_media(fixtures::private_text(5, ""), fixtures::photo("p"));

        let err = media.acquire_strict(&msg).await.unwrap_err();
        assert!(matches!(err, RelayError::MediaAcquisitionFailed { .. }));
        assert!(!media.dir().join("media_queued_5.jpg").exists());
    }

    #[tokio::test]
    async fn strict_acquire_uses_redrive_name() {
        let dir = tempfile::tempdir().unwrap();
        let (media, _backend) = manager(dir.path());
        let msg = fixtures::with_media(fixtures::private_text(5, ""), fixtures::photo("p"));
        let lease = media.acquire_strict(&msg).await.unwrap().unwrap();
        assert_eq!(lease.path(), media.dir().join("media_queued_5.jpg"));
    }

    #[test]
    fn lease_tolerates_already_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.jpg");
        std::fs::write(&path, b"x").unwrap();
        let lease = MediaLease { path: path.clone() };
        std::fs::remove_file(&path).unwrap();
        drop(lease);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn purge_all_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (media, _backend) = manager(dir.path());
        media.ensure_dir().await.unwrap();
        std::fs::write(media.dir().join("stray.jpg"), b"x").unwrap();
        media.purge_all().await;
        assert!(!media.dir().exists());
        media.purge_all().await;
    }
}
