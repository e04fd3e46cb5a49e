// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue drain loop: periodically redrives retry-eligible records.
//!
//! Per-item failures become queue updates and never abort the batch. A
//! failed store update is logged; the record is simply seen again next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courier_core::{
    ConnectivityProbe, MessagingBackend, QueuedDelivery, RelayError, RelayStatus, SourceMessage,
};
use courier_storage::QueueStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::Deliverer;
use crate::media::MediaManager;

/// Drain loop timing and batch size.
#[derive(Debug, Clone, Copy)]
pub struct DrainSettings {
    pub interval: Duration,
    pub offline_backoff: Duration,
    pub batch_size: u32,
}

/// Counters from one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// The gate reported the network down and the pass was skipped.
    pub offline: bool,
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
    /// Left untouched because shutdown interrupted the delivery.
    pub interrupted: usize,
    pub purged: usize,
}

enum ItemOutcome {
    Completed,
    Failed,
    Abandoned,
    Interrupted,
}

/// Background redrive of the durable queue.
pub struct DrainLoop {
    probe: Arc<dyn ConnectivityProbe>,
    backend: Arc<dyn MessagingBackend>,
    media: MediaManager,
    deliverer: Arc<Deliverer>,
    store: QueueStore,
    status: RelayStatus,
    settings: DrainSettings,
}

impl DrainLoop {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        backend: Arc<dyn MessagingBackend>,
        media: MediaManager,
        deliverer: Arc<Deliverer>,
        store: QueueStore,
        status: RelayStatus,
        settings: DrainSettings,
    ) -> Self {
        Self {
            probe,
            backend,
            media,
            deliverer,
            store,
            status,
            settings,
        }
    }

    /// Run passes until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            batch_size = self.settings.batch_size,
            "queue drain loop started"
        );
        loop {
            let report = self.run_pass(&cancel).await;
            let pause = if report.offline {
                self.settings.offline_backoff
            } else {
                self.settings.interval
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("queue drain loop stopped");
    }

    /// One pass: gate, redrive a batch oldest-first, purge expired records.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> PassReport {
        let mut report = PassReport::default();

        if !self.probe.is_reachable().await {
            warn!("network unreachable, skipping queue drain pass");
            report.offline = true;
            return report;
        }

        let batch = match self.store.select_retry_eligible(self.settings.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "failed to read queue");
                return report;
            }
        };
        report.selected = batch.len();

        for record in &batch {
            if cancel.is_cancelled() {
                debug!("drain pass interrupted by shutdown");
                break;
            }
            match self.redrive(record).await {
                ItemOutcome::Completed => report.completed += 1,
                ItemOutcome::Failed => report.failed += 1,
                ItemOutcome::Abandoned => report.abandoned += 1,
                ItemOutcome::Interrupted => report.interrupted += 1,
            }
        }

        match self.store.purge_expired().await {
            Ok(purged) => report.purged = purged,
            Err(e) => error!(error = %e, "failed to purge expired queue records"),
        }

        if report.selected > 0 || report.purged > 0 {
            info!(
                selected = report.selected,
                completed = report.completed,
                failed = report.failed,
                abandoned = report.abandoned,
                interrupted = report.interrupted,
                purged = report.purged,
                "queue drain pass finished"
            );
        }
        report
    }

    async fn redrive(&self, record: &QueuedDelivery) -> ItemOutcome {
        let message = match self.refetch(record).await {
            Ok(Some(message)) => message,
            Ok(None) => return ItemOutcome::Abandoned,
            Err(e) => return self.fail(record, &e.to_string()).await,
        };

        // Dropped after delivery, whatever the outcome.
        let lease = match self.media.acquire_strict(&message).await {
            Ok(lease) => lease,
            Err(e) => {
                return self
                    .fail(record, &format!("media download failed: {e}"))
                    .await;
            }
        };

        let media_path = lease.as_ref().map(|l| l.path());
        match self
            .deliverer
            .deliver(&message, media_path, record.is_edit)
            .await
        {
            Ok(()) => {
                if let Err(e) = self.store.mark_completed(record.id).await {
                    error!(id = record.id, error = %e, "failed to mark queued delivery completed");
                }
                self.status.record_relayed(Utc::now());
                info!(id = record.id, message_id = record.source_message_id, "queued message relayed");
                ItemOutcome::Completed
            }
            Err(e) if e.is_cancelled() => {
                debug!(id = record.id, "redrive interrupted by shutdown, record left as is");
                ItemOutcome::Interrupted
            }
            Err(e) => self.fail(record, &e.to_string()).await,
        }
    }

    /// Re-resolve the source chat and message. `Ok(None)` means the record was
    /// retired because its source is gone for good.
    async fn refetch(&self, record: &QueuedDelivery) -> Result<Option<SourceMessage>, RelayError> {
        if self.backend.resolve_chat(record.source_chat_id).await?.is_none() {
            self.abandon(
                record,
                &format!("source chat {} no longer exists", record.source_chat_id),
            )
            .await;
            return Ok(None);
        }

        let fetched = self
            .backend
            .fetch_message(record.source_chat_id, record.source_message_id)
            .await?;
        if fetched.is_none() {
            self.abandon(
                record,
                &format!("original message {} not found", record.source_message_id),
            )
            .await;
        }
        Ok(fetched)
    }

    async fn fail(&self, record: &QueuedDelivery, reason: &str) -> ItemOutcome {
        warn!(
            id = record.id,
            message_id = record.source_message_id,
            retry_count = record.retry_count + 1,
            reason,
            "queued delivery failed"
        );
        if let Err(e) = self.store.mark_failed(record.id, reason).await {
            error!(id = record.id, error = %e, "failed to record queued delivery failure");
        }
        ItemOutcome::Failed
    }

    async fn abandon(&self, record: &QueuedDelivery, reason: &str) {
        warn!(
            id = record.id,
            message_id = record.source_message_id,
            reason,
            "retiring queued delivery"
        );
        if let Err(e) = self.store.mark_abandoned(record.id, reason).await {
            error!(id = record.id, error = %e, "failed to retire queued delivery");
        }
    }
}
