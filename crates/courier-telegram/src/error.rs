// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot API error classification.

use std::time::Duration;

use courier_core::RelayError;
use teloxide::{ApiError, DownloadError, RequestError};

/// Map a Bot API request failure onto the relay's error taxonomy.
///
/// Flood control becomes [`RelayError::RateLimited`] with the server's hint,
/// API refusals become [`RelayError::DeliveryRejected`], and everything else
/// (network, I/O, malformed responses) is a transient backend error.
pub fn map_request_error(e: RequestError, context: &str) -> RelayError {
    match e {
        RequestError::RetryAfter(secs) => RelayError::RateLimited {
            retry_after: Some(Duration::from_secs(u64::from(secs.seconds()))),
        },
        RequestError::Api(_) | RequestError::MigrateToChatId(_) => {
            RelayError::DeliveryRejected {
                message: format!("{context}: {e}"),
                source: Some(Box::new(e)),
            }
        }
        other => RelayError::Backend {
            message: format!("{context}: {other}"),
            source: Some(Box::new(other)),
        },
    }
}

/// Whether the API reported that the chat does not exist (or is not visible
/// to the bot).
pub fn is_chat_not_found(e: &RequestError) -> bool {
    matches!(e, RequestError::Api(ApiError::ChatNotFound))
}

pub fn map_download_error(e: DownloadError, context: &str) -> RelayError {
    RelayError::MediaAcquisitionFailed {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}
