// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable record of observed source messages.
//!
//! Backends that cannot fetch history on demand save every message they see
//! here, so queued deliveries can still be redriven after a restart.

use chrono::Utc;
use courier_core::{RelayError, SourceMessage};

use crate::database::Database;
use crate::queries::messages;

/// Source message snapshots, sharing the queue database.
#[derive(Clone)]
pub struct MessageArchive {
    db: Database,
}

impl MessageArchive {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store the latest version of `message`.
    pub async fn save(&self, message: &SourceMessage) -> Result<(), RelayError> {
        messages::save(&self.db, message, Utc::now()).await
    }

    pub async fn load(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<SourceMessage>, RelayError> {
        messages::load(&self.db, chat_id, message_id).await
    }
}
