// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level relay task: wires the gate, media manager, delivery executor,
//! live handler and drain loop together and owns the status cell.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{
    ConnectivityProbe, MessagingBackend, RelayError, RelayStatus, normalize_destination,
};
use courier_storage::QueueStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::delivery::{Deliverer, RetryPolicy};
use crate::drain::{DrainLoop, DrainSettings};
use crate::ingest::{IngestExit, IngestHandler};
use crate::media::MediaManager;

/// The reliable relay between one source and one destination.
#[derive(Clone)]
pub struct Relay {
    config: Arc<CourierConfig>,
    backend: Arc<dyn MessagingBackend>,
    probe: Arc<dyn ConnectivityProbe>,
    store: QueueStore,
    status: RelayStatus,
}

impl Relay {
    pub fn new(
        config: Arc<CourierConfig>,
        backend: Arc<dyn MessagingBackend>,
        probe: Arc<dyn ConnectivityProbe>,
        store: QueueStore,
        status: RelayStatus,
    ) -> Self {
        Self {
            config,
            backend,
            probe,
            store,
            status,
        }
    }

    pub fn status(&self) -> &RelayStatus {
        &self.status
    }

    /// Run until `cancel` fires or the event stream ends.
    ///
    /// Connects, verifies the destination, prepares the media directory,
    /// subscribes to the source and spawns the drain loop. On exit the drain
    /// loop is stopped, the media directory removed and the WAL checkpointed.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), RelayError> {
        let result = self.run(cancel).await;
        match &result {
            Ok(()) => self.status.mark_stopped(None),
            Err(e) => {
                error!(error = %e, "relay stopped with error");
                self.status.mark_stopped(Some(e.to_string()));
            }
        }
        result
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), RelayError> {
        let source = required(self.config.relay.source.as_deref(), "relay.source")?;
        let destination = normalize_destination(required(
            self.config.relay.destination.as_deref(),
            "relay.destination",
        )?)?;

        self.backend.connect().await?;
        info!(backend = self.backend.name(), "backend connected");

        let resolved = self.backend.resolve_destination(&destination).await?;
        info!(
            destination = %destination,
            chat_id = resolved.id,
            title = resolved.title.as_deref().unwrap_or("<untitled>"),
            "destination verified"
        );

        let media = MediaManager::new(&self.config.media.temp_dir, self.backend.clone());
        media.ensure_dir().await?;

        let events = self.backend.subscribe(source).await?;
        info!(source, "subscribed to source");

        let deliverer = Arc::new(
            Deliverer::new(
                self.backend.clone(),
                destination,
                RetryPolicy::from_config(&self.config.delivery),
            )
            .with_cancellation(cancel.clone()),
        );

        let drain = DrainLoop::new(
            self.probe.clone(),
            self.backend.clone(),
            media.clone(),
            deliverer.clone(),
            self.store.clone(),
            self.status.clone(),
            DrainSettings {
                interval: self.config.queue.drain_interval(),
                offline_backoff: self.config.connectivity.offline_backoff(),
                batch_size: self.config.queue.batch_size,
            },
        );
        let drain_cancel = cancel.child_token();
        let drain_task = {
            let drain_cancel = drain_cancel.clone();
            tokio::spawn(async move { drain.run(drain_cancel).await })
        };

        let ingest = IngestHandler::new(
            self.probe.clone(),
            media.clone(),
            deliverer,
            self.store.clone(),
            self.status.clone(),
        );

        self.status.mark_started();
        info!("relay running");
        let exit = ingest.run(events, cancel).await;

        drain_cancel.cancel();
        if let Err(e) = drain_task.await {
            error!(error = %e, "drain task panicked");
        }
        media.purge_all().await;
        if let Err(e) = self.store.checkpoint().await {
            error!(error = %e, "WAL checkpoint failed during shutdown");
        }

        match exit {
            IngestExit::Cancelled => {
                info!("relay stopped");
                Ok(())
            }
            IngestExit::StreamClosed => Err(RelayError::backend("source event stream closed")),
        }
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str, RelayError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RelayError::Config(format!("missing required key `{key}`")))
}
