// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier relay tests.
//!
//! Provides mock collaborators for fast, deterministic tests without a live
//! messaging backend or network.
//!
//! # Components
//!
//! - [`MockBackend`] - scripted messaging backend capturing every send
//! - [`StaticProbe`] - connectivity probe with a switchable answer
//! - [`fixtures`] - source message builders

pub mod fixtures;
pub mod mock_backend;
pub mod probe;

pub use mock_backend::{MockBackend, SentItem};
pub use probe::StaticProbe;
