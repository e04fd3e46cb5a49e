// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests: live ingestion, queue drain and the relay task,
//! against a real SQLite queue and the mock backend.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{DeliveryStatus, Destination, RelayError, RelayStatus, SourceEvent};
use courier_relay::{
    Deliverer, DrainLoop, DrainSettings, IngestExit, IngestHandler, IngestOutcome, MediaManager,
    RetryPolicy,
};
use courier_storage::{Database, QueueStore};
use courier_test_utils::{MockBackend, StaticProbe, fixtures};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DEST: i64 = -100123456789;

struct Harness {
    dir: TempDir,
    backend: Arc<MockBackend>,
    probe: StaticProbe,
    store: QueueStore,
    status: RelayStatus,
    media: MediaManager,
    deliverer: Arc<Deliverer>,
    /// Interrupts the deliverer's backoff sleeps.
    shutdown: CancellationToken,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("queue.db").to_str().unwrap())
            .await
            .unwrap();
        let store = QueueStore::new(db, 3, 1);
        let backend = Arc::new(MockBackend::new());
        let media = MediaManager::new(dir.path().join("media"), backend.clone());
        let shutdown = CancellationToken::new();
        let deliverer = Arc::new(
            Deliverer::new(
                backend.clone(),
                Destination::ChatId(DEST),
                RetryPolicy::new(5, 10, 100),
            )
            .with_cancellation(shutdown.clone()),
        );
        Self {
            dir,
            backend,
            probe: StaticProbe::online(),
            store,
            status: RelayStatus::new(),
            media,
            deliverer,
            shutdown,
        }
    }

    fn ingest(&self) -> IngestHandler {
        IngestHandler::new(
            Arc::new(self.probe.clone()),
            self.media.clone(),
            self.deliverer.clone(),
            self.store.clone(),
            self.status.clone(),
        )
    }

    fn drain(&self) -> DrainLoop {
        DrainLoop::new(
            Arc::new(self.probe.clone()),
            self.backend.clone(),
            self.media.clone(),
            self.deliverer.clone(),
            self.store.clone(),
            self.status.clone(),
            DrainSettings {
                interval: Duration::from_millis(20),
                offline_backoff: Duration::from_millis(20),
                batch_size: 10,
            },
        )
    }

    fn media_files(&self) -> Vec<std::path::PathBuf> {
        match std::fs::read_dir(self.media.dir()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[tokio::test]
async fn successful_live_delivery_persists_nothing() {
    let h = Harness::new().await;
    let msg = fixtures::with_media(fixtures::group_text(1, "look"), fixtures::photo("p"));

    let outcome = h.ingest().handle(SourceEvent::NewMessage(msg)).await;

    assert_eq!(outcome, IngestOutcome::Delivered);
    assert!(h.store.list_recent(10).await.unwrap().is_empty());
    let sent = h.backend.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_file());
    assert!(h.media_files().is_empty(), "media must be released");
    assert!(h.status.snapshot().last_relayed_at.is_some());
}

#[tokio::test]
async fn failed_live_delivery_enqueues_pending_record() {
    let h = Harness::new().await;
    h.backend.fail_all_sends(|| RelayError::backend("connection reset"));
    let msg = fixtures::with_media(fixtures::private_text(7, "hi"), fixtures::photo("p"));

    let outcome = h.ingest().handle(SourceEvent::NewMessage(msg)).await;

    let IngestOutcome::Enqueued { id } = outcome else {
        panic!("expected enqueue, got {outcome:?}");
    };
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, DeliveryStatus::Pending);
    assert_eq!(record.retry_count, 0);
    assert_eq!(record.source_message_id, 7);
    assert!(!record.is_edit);
    assert_eq!(
        record.media_path_snapshot,
        Some(h.media.dir().join("media_7.jpg"))
    );
    assert!(h.media_files().is_empty(), "media must be released");

    let eligible = h.store.select_retry_eligible(10).await.unwrap();
    assert_eq!(eligible.len(), 1);
}

#[tokio::test]
async fn unreachable_ingestion_enqueues_without_download() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    let msg = fixtures::with_media(fixtures::private_text(3, "hi"), fixtures::photo("p"));

    let outcome = h.ingest().handle(SourceEvent::Edited(msg)).await;

    let IngestOutcome::Enqueued { id } = outcome else {
        panic!("expected enqueue, got {outcome:?}");
    };
    let record = h.store.get(id).await.unwrap().unwrap();
    assert!(record.media_path_snapshot.is_none());
    assert!(record.is_edit);
    assert_eq!(h.backend.downloads(), 0);
    assert_eq!(h.backend.send_attempts(), 0);
}

#[tokio::test]
async fn live_media_failure_still_sends_text() {
    let h = Harness::new().await;
    h.backend.set_media_bytes(None).await;
    let msg = fixtures::with_media(fixtures::private_text(3, "caption"), fixtures::photo("p"));

    let outcome = h.ingest().handle(SourceEvent::NewMessage(msg)).await;

    assert_eq!(outcome, IngestOutcome::Delivered);
    let sent = h.backend.sent().await;
    assert!(!sent[0].is_file());
    assert_eq!(sent[0].text(), "caption");
}

#[tokio::test]
async fn rate_limit_exhaustion_then_redrive_completes() {
    let h = Harness::new().await;
    let msg = fixtures::private_text(11, "hello");
    h.backend.store_message(msg.clone()).await;

    // Live: five rate-limited attempts, then enqueue.
    h.backend
        .fail_all_sends(|| RelayError::RateLimited { retry_after: None });
    let IngestOutcome::Enqueued { id } = h.ingest().handle(SourceEvent::NewMessage(msg)).await
    else {
        panic!("expected enqueue");
    };
    assert_eq!(h.backend.send_attempts(), 5);

    // First drain pass: still rate-limited.
    let cancel = CancellationToken::new();
    let report = h.drain().run_pass(&cancel).await;
    assert_eq!(report.failed, 1);
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, DeliveryStatus::Failed);
    assert_eq!(record.retry_count, 1);
    assert!(record.last_error.unwrap().contains("rate limited"));

    // Second pass: backend recovered.
    h.backend.clear_failures();
    let report = h.drain().run_pass(&cancel).await;
    assert_eq!(report.completed, 1);
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, DeliveryStatus::Completed);
    assert_eq!(record.retry_count, 1);
    assert_eq!(h.backend.sent_count().await, 1);
}

#[tokio::test]
async fn shutdown_during_redrive_backoff_does_not_count_an_attempt() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    let msg = fixtures::private_text(12, "later");
    h.backend.store_message(msg.clone()).await;
    let IngestOutcome::Enqueued { id } = h.ingest().handle(SourceEvent::NewMessage(msg)).await
    else {
        panic!("expected enqueue");
    };
    h.probe.set_reachable(true);
    h.backend
        .fail_all_sends(|| RelayError::RateLimited { retry_after: None });

    // Shutdown already requested: the first backoff sleep is cut short.
    h.shutdown.cancel();
    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert_eq!(report.selected, 1);
    assert_eq!(report.interrupted, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(h.backend.send_attempts(), 1);
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, DeliveryStatus::Pending);
    assert_eq!(record.retry_count, 0);
    assert!(record.last_error.is_none());
    assert_eq!(h.store.select_retry_eligible(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn shutdown_during_live_backoff_still_queues_message() {
    let h = Harness::new().await;
    h.backend
        .fail_all_sends(|| RelayError::RateLimited { retry_after: None });
    h.shutdown.cancel();

    let outcome = h
        .ingest()
        .handle(SourceEvent::NewMessage(fixtures::private_text(13, "x")))
        .await;

    let IngestOutcome::Enqueued { id } = outcome else {
        panic!("expected enqueue, got {outcome:?}");
    };
    assert_eq!(h.backend.send_attempts(), 1);
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.retry_count, 0);
}

#[tokio::test]
async fn buffered_events_are_queued_when_ingestion_is_cancelled() {
    let h = Harness::new().await;
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(SourceEvent::NewMessage(fixtures::private_text(1, "a")))
        .await
        .unwrap();
    tx.send(SourceEvent::Edited(fixtures::private_text(2, "b")))
        .await
        .unwrap();
    tx.send(SourceEvent::NewMessage(fixtures::with_media(
        fixtures::private_text(3, "c"),
        fixtures::photo("p"),
    )))
    .await
    .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let exit = h.ingest().run(rx, cancel).await;

    assert_eq!(exit, IngestExit::Cancelled);
    assert_eq!(h.backend.send_attempts(), 0);
    assert_eq!(h.backend.downloads(), 0);
    let pending = h.store.select_retry_eligible(10).await.unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|r| r.status == DeliveryStatus::Pending));
    assert!(pending.iter().all(|r| r.media_path_snapshot.is_none()));
    let edits: Vec<bool> = pending.iter().map(|r| r.is_edit).collect();
    assert_eq!(edits, vec![false, true, false]);
    // The sender side sees the channel closed.
    assert!(tx.is_closed());
}

#[tokio::test]
async fn drain_skips_pass_when_offline() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    h.ingest()
        .handle(SourceEvent::NewMessage(fixtures::private_text(1, "x")))
        .await;

    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert!(report.offline);
    assert_eq!(report.selected, 0);
    assert_eq!(h.store.select_retry_eligible(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_source_message_is_retired() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    let msg = fixtures::private_text(21, "gone soon");
    h.backend.store_message(fixtures::private_text(99, "other")).await;
    let IngestOutcome::Enqueued { id } = h.ingest().handle(SourceEvent::NewMessage(msg)).await
    else {
        panic!("expected enqueue");
    };
    h.probe.set_reachable(true);

    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert_eq!(report.abandoned, 1);
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, DeliveryStatus::Failed);
    assert_eq!(record.retry_count, 3);
    assert!(record.last_error.unwrap().contains("not found"));
    assert!(h.store.select_retry_eligible(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_source_chat_is_retired() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    let msg = fixtures::private_text(5, "x");
    h.backend.store_message(msg.clone()).await;
    h.ingest().handle(SourceEvent::NewMessage(msg.clone())).await;
    h.backend.remove_chat(msg.chat_id).await;
    h.probe.set_reachable(true);

    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert_eq!(report.abandoned, 1);
    assert_eq!(h.backend.send_attempts(), 0);
}

#[tokio::test]
async fn redrive_media_failure_skips_delivery() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    let msg = fixtures::with_media(fixtures::private_text(8, "pic"), fixtures::photo("p"));
    h.backend.store_message(msg.clone()).await;
    let IngestOutcome::Enqueued { id } = h.ingest().handle(SourceEvent::NewMessage(msg)).await
    else {
        panic!("expected enqueue");
    };
    h.probe.set_reachable(true);
    h.backend.set_media_bytes(Some(Vec::new())).await;

    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(h.backend.send_attempts(), 0, "no text-only downgrade on redrive");
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.retry_count, 1);
    assert!(record.last_error.unwrap().starts_with("media download failed"));
    assert!(h.media_files().is_empty());
}

#[tokio::test]
async fn redrive_sends_media_and_keeps_edit_flag() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    let msg = fixtures::with_media(fixtures::group_text(4, "new pic"), fixtures::photo("p"));
    h.backend.store_message(msg.clone()).await;
    h.ingest().handle(SourceEvent::Edited(msg)).await;
    h.probe.set_reachable(true);

    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert_eq!(report.completed, 1);
    let sent = h.backend.sent().await;
    assert!(sent[0].is_file());
    assert!(sent[0].text().starts_with("From: Ann (@ann99)\n[edited "));
    assert!(h.media_files().is_empty(), "redrive media must be released");
}

#[tokio::test]
async fn drain_processes_oldest_first_and_survives_item_failures() {
    let h = Harness::new().await;
    h.probe.set_reachable(false);
    for id in 1..=3 {
        let msg = fixtures::private_text(id, &format!("m{id}"));
        if id != 2 {
            h.backend.store_message(msg.clone()).await;
        }
        h.ingest().handle(SourceEvent::NewMessage(msg)).await;
    }
    h.probe.set_reachable(true);

    let report = h.drain().run_pass(&CancellationToken::new()).await;

    assert_eq!(report.selected, 3);
    assert_eq!(report.completed, 2);
    assert_eq!(report.abandoned, 1);
    let texts: Vec<String> = h
        .backend
        .sent()
        .await
        .iter()
        .map(|s| s.text().to_string())
        .collect();
    assert_eq!(texts, vec!["m1", "m3"]);
}

#[tokio::test]
async fn drain_loop_stops_on_cancel() {
    let h = Harness::new().await;
    let cancel = CancellationToken::new();
    let drain = h.drain();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { drain.run(cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("drain loop did not stop")
        .unwrap();
    assert!(h.probe.calls() >= 1);
    drop(h.dir);
}
