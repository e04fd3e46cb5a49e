// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory front of the message archive.
//!
//! Holds the most recently observed source messages so redrives of fresh
//! records skip the database. Least recently stored entries are evicted once
//! `capacity` is reached.

use std::num::NonZeroUsize;

use courier_core::SourceMessage;
use lru::LruCache;

type Key = (i64, i64);

#[derive(Debug)]
pub struct MessageCache {
    entries: LruCache<Key, SourceMessage>,
}

impl MessageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Insert or replace a message. Replacing (an edit) refreshes its age.
    pub fn insert(&mut self, message: SourceMessage) {
        self.entries.put((message.chat_id, message.id), message);
    }

    /// Look up without touching recency; only stores count as use.
    pub fn get(&self, chat_id: i64, message_id: i64) -> Option<&SourceMessage> {
        self.entries.peek(&(chat_id, message_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
