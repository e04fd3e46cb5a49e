// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity probe trait used to gate delivery and queue draining.

use async_trait::async_trait;

/// Cheap reachability check.
///
/// Implementations never error and must not cache results between calls.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + 'static {
    async fn is_reachable(&self) -> bool;
}
