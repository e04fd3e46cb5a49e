// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owns the relay task so it can be restarted from the health surface.

use courier_core::{RelayError, RelayStatus};
use courier_relay::Relay;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct RelaySupervisor {
    relay: Relay,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<Result<(), RelayError>>>>,
}

impl RelaySupervisor {
    pub fn new(relay: Relay, shutdown: CancellationToken) -> Self {
        Self {
            relay,
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn status(&self) -> &RelayStatus {
        self.relay.status()
    }

    /// Spawn the relay unless a relay task is still alive or shutdown has
    /// begun. Returns whether a task was spawned.
    pub async fn start_if_idle(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let relay = self.relay.clone();
        let cancel = self.shutdown.child_token();
        *task = Some(tokio::spawn(async move { relay.start(cancel).await }));
        info!("relay task spawned");
        true
    }

    /// Wait for the current relay task, if any, to finish.
    pub async fn join(&self) -> Option<Result<(), RelayError>> {
        let handle = self.task.lock().await.take()?;
        Some(match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "relay task panicked");
                Err(RelayError::Internal(format!("relay task panicked: {e}")))
            }
        })
    }
}
