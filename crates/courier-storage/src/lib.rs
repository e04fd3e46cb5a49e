// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable SQLite delivery queue for the Courier relay.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the typed queue operations the
//! live handler and drain loop rely on, plus the source message archive
//! used to redrive them.

pub mod archive;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;

pub use archive::MessageArchive;
pub use database::Database;
pub use store::QueueStore;
