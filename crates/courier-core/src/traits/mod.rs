// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the relay pipeline and its collaborators.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod backend;
pub mod probe;

pub use backend::MessagingBackend;
pub use probe::ConnectivityProbe;
