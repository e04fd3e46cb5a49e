// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide relay status cell.
//!
//! Written only by the relay's top-level task, read by the health surface.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time copy of the relay status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub last_error: Option<String>,
    pub last_relayed_at: Option<DateTime<Utc>>,
}

/// Shared, lock-protected status cell. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct RelayStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl RelayStatus {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the snapshot half-written,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, StatusSnapshot> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusSnapshot> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.read().running
    }

    /// Marks the relay as started and clears the previous error.
    pub fn mark_started(&self) {
        let mut status = self.write();
        status.running = true;
        status.last_error = None;
    }

    /// Marks the relay as stopped, recording the error that stopped it, if any.
    pub fn mark_stopped(&self, error: Option<String>) {
        let mut status = self.write();
        status.running = false;
        if error.is_some() {
            status.last_error = error;
        }
    }

    pub fn record_relayed(&self, at: DateTime<Utc>) {
        self.write().last_relayed_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let status = RelayStatus::new();
        assert_eq!(status.snapshot(), StatusSnapshot::default());
        assert!(!status.is_running());
    }

    #[test]
    fn start_clears_previous_error() {
        let status = RelayStatus::new();
        status.mark_stopped(Some("boom".into()));
        assert_eq!(status.snapshot().last_error.as_deref(), Some("boom"));

        status.mark_started();
        let snap = status.snapshot();
        assert!(snap.running);
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn clean_stop_keeps_last_error() {
        let status = RelayStatus::new();
        status.mark_stopped(Some("destination unreachable".into()));
        status.mark_stopped(None);

        let snap = status.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.last_error.as_deref(), Some("destination unreachable"));
    }

    #[test]
    fn clones_share_state() {
        let status = RelayStatus::new();
        let reader = status.clone();
        status.mark_started();
        assert!(reader.is_running());
    }
}
