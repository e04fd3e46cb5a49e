// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity gate: a short-timeout GET against a highly available endpoint.

use std::time::Duration;

use async_trait::async_trait;
use courier_config::model::ConnectivityConfig;
use courier_core::{ConnectivityProbe, RelayError};
use tracing::debug;

/// HTTP reachability probe.
///
/// Any transport error, timeout or non-2xx status counts as unreachable.
/// Every call performs a fresh request.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &ConnectivityConfig) -> Result<Self, RelayError> {
        Self::new(config.probe_url.clone(), config.timeout())
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(url = %self.url, status = %resp.status(), "probe returned non-success status");
                false
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "probe request failed");
                false
            }
        }
    }
}
