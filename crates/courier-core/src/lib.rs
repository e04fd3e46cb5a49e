// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier relay.
//!
//! Provides the error type, the domain types shared by the queue store and
//! the relay pipeline, the trait seams for messaging backends and
//! connectivity probes, and the process-wide status cell.

pub mod destination;
pub mod error;
pub mod status;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use destination::normalize_destination;
pub use error::RelayError;
pub use status::{RelayStatus, StatusSnapshot};
pub use traits::{ConnectivityProbe, MessagingBackend};
pub use types::{
    ChatKind, DeliveryStatus, Destination, Media, MediaKind, NewDelivery, QueuedDelivery,
    ResolvedChat, Sender, SourceEvent, SourceMessage,
};
