// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens the queue database, builds the Telegram backend and connectivity
//! probe, runs the relay under a supervisor and (optionally) the health
//! surface, then tears everything down on SIGINT/SIGTERM.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{RelayError, RelayStatus};
use courier_relay::{HttpProbe, Relay};
use courier_storage::{MessageArchive, QueueStore};
use courier_telegram::TelegramBackend;
use tracing::{error, info, warn};

use crate::health;
use crate::shutdown;
use crate::supervisor::RelaySupervisor;

pub async fn run_serve(config: CourierConfig) -> Result<(), RelayError> {
    init_tracing(&config.relay.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting courier serve");

    let store = QueueStore::open(&config.storage, &config.queue).await?;
    info!(path = %config.storage.database_path, "queue database ready");

    let archive = MessageArchive::new(store.database().clone());
    let backend = Arc::new(TelegramBackend::new(&config.telegram, archive)?);
    let probe = Arc::new(HttpProbe::from_config(&config.connectivity)?);

    let shutdown = shutdown::install_signal_handler();
    let config = Arc::new(config);
    let relay = Relay::new(
        config.clone(),
        backend,
        probe,
        store.clone(),
        RelayStatus::new(),
    );
    let supervisor = Arc::new(RelaySupervisor::new(relay, shutdown.clone()));

    let health_task = if config.health.enabled {
        let listener = health::bind(&config.health).await?;
        Some(tokio::spawn(health::serve(
            listener,
            supervisor.clone(),
            shutdown.clone(),
        )))
    } else {
        None
    };

    supervisor.start_if_idle().await;

    let outcome = match health_task {
        Some(task) => {
            // The health surface keeps the process alive so a failed relay
            // can be inspected and restarted.
            shutdown.cancelled().await;
            let outcome = supervisor.join().await;
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "health server failed"),
                Err(e) => error!(error = %e, "health server task panicked"),
            }
            outcome
        }
        None => {
            let outcome = supervisor.join().await;
            shutdown.cancel();
            outcome
        }
    };

    if let Err(e) = store.database().clone().close().await {
        warn!(error = %e, "failed to close queue database");
    }
    info!("courier stopped");

    match outcome {
        Some(Err(e)) if !config.health.enabled => Err(e),
        _ => Ok(()),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
