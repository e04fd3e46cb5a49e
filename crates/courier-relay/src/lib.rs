// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reliable relay pipeline for Courier.
//!
//! Live events flow through the connectivity gate, media manager, formatter
//! and delivery executor; failures land in the durable queue, which the drain
//! loop redrives in the background.

pub mod delivery;
pub mod drain;
pub mod format;
pub mod gate;
pub mod ingest;
pub mod media;
pub mod relay;

pub use delivery::{Deliverer, RetryPolicy};
pub use drain::{DrainLoop, DrainSettings, PassReport};
pub use gate::HttpProbe;
pub use ingest::{IngestExit, IngestHandler, IngestOutcome};
pub use media::{MediaLease, MediaManager};
pub use relay::Relay;
