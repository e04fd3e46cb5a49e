// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live ingestion: react to new and edited source messages, relay them
//! immediately when possible and fall back to the durable queue.

use std::sync::Arc;

use chrono::Utc;
use courier_core::{
    ConnectivityProbe, NewDelivery, RelayError, RelayStatus, SourceEvent, SourceMessage,
};
use courier_storage::QueueStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::delivery::Deliverer;
use crate::media::MediaManager;

/// What happened to one live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Relayed on the first try; nothing persisted.
    Delivered,
    /// Persisted for the drain loop.
    Enqueued { id: i64 },
    /// Delivery failed and so did the enqueue; the message is lost.
    Lost,
}

/// Why the ingestion loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestExit {
    Cancelled,
    StreamClosed,
}

/// Handles live events one at a time, in arrival order.
pub struct IngestHandler {
    probe: Arc<dyn ConnectivityProbe>,
    media: MediaManager,
    deliverer: Arc<Deliverer>,
    store: QueueStore,
    status: RelayStatus,
}

impl IngestHandler {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        media: MediaManager,
        deliverer: Arc<Deliverer>,
        store: QueueStore,
        status: RelayStatus,
    ) -> Self {
        Self {
            probe,
            media,
            deliverer,
            store,
            status,
        }
    }

    /// Consume events until cancelled or the backend closes the stream.
    ///
    /// Cancellation is only observed between events. Events already buffered
    /// when it fires are queued for the drain loop without a delivery attempt.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<SourceEvent>,
        cancel: CancellationToken,
    ) -> IngestExit {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.persist_buffered(&mut events).await;
                    return IngestExit::Cancelled;
                }
                event = events.recv() => event,
            };
            match event {
                Some(event) => {
                    self.handle(event).await;
                }
                None => return IngestExit::StreamClosed,
            }
        }
    }

    /// Process one event. Never fails; every error ends in the queue or a log line.
    pub async fn handle(&self, event: SourceEvent) -> IngestOutcome {
        let is_edit = event.is_edit();
        let message = event.message();
        info!(
            message_id = message.id,
            chat_id = message.chat_id,
            is_edit,
            media = %message.media_kind(),
            "source message received"
        );

        if !self.probe.is_reachable().await {
            warn!(message_id = message.id, "network unreachable, queueing message");
            return self.enqueue(message, None, is_edit).await;
        }

        // Dropped at the end of this function on every path.
        let lease = self.media.acquire(message).await;
        let media_path = lease.as_ref().map(|l| l.path());

        match self.deliverer.deliver(message, media_path, is_edit).await {
            Ok(()) => {
                self.status.record_relayed(Utc::now());
                info!(message_id = message.id, "message relayed");
                IngestOutcome::Delivered
            }
            Err(e) => {
                error!(message_id = message.id, error = %e, "live delivery failed, queueing message");
                self.enqueue(message, media_path.map(|p| p.to_path_buf()), is_edit)
                    .await
            }
        }
    }

    async fn persist_buffered(&self, events: &mut mpsc::Receiver<SourceEvent>) {
        events.close();
        let mut queued = 0usize;
        while let Some(event) = events.recv().await {
            if let IngestOutcome::Enqueued { .. } =
                self.enqueue(event.message(), None, event.is_edit()).await
            {
                queued += 1;
            }
        }
        if queued > 0 {
            info!(queued, "buffered source events queued on shutdown");
        }
    }

    async fn enqueue(
        &self,
        message: &SourceMessage,
        media_path: Option<std::path::PathBuf>,
        is_edit: bool,
    ) -> IngestOutcome {
        let delivery = NewDelivery::from_message(message, media_path, is_edit);
        match self.store.enqueue(&delivery).await {
            Ok(id) => IngestOutcome::Enqueued { id },
            Err(e) => {
                log_enqueue_failure(message, &e);
                IngestOutcome::Lost
            }
        }
    }
}

fn log_enqueue_failure(message: &SourceMessage, e: &RelayError) {
    error!(
        message_id = message.id,
        chat_id = message.chat_id,
        error = %e,
        "failed to queue message"
    );
}
