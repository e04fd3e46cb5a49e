// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier relay.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across the relay pipeline and backend traits.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (missing source/destination/credentials, bad identifiers).
    #[error("configuration error: {0}")]
    Config(String),

    /// Queue store errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The connectivity probe reported the network as unreachable.
    #[error("connectivity unavailable")]
    ConnectivityUnavailable,

    /// Media could not be downloaded (or was empty after download).
    #[error("media acquisition failed: {message}")]
    MediaAcquisitionFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend asked us to slow down.
    #[error("rate limited by backend{}", format_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// The backend refused the delivery (invalid destination, forbidden, bad payload).
    #[error("delivery rejected: {message}")]
    DeliveryRejected {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The source chat or message no longer exists.
    #[error("not found: {what}")]
    RecordNotFound { what: String },

    /// Transient backend I/O failure (network, timeout, unexpected response).
    #[error("backend error: {message}")]
    Backend {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Shutdown interrupted the operation before it finished.
    #[error("interrupted by shutdown")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {d:?})"))
        .unwrap_or_default()
}

impl RelayError {
    /// Shorthand for a [`RelayError::Backend`] without a source error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`RelayError::DeliveryRejected`] without a source error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::DeliveryRejected {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`RelayError::MediaAcquisitionFailed`] without a source error.
    pub fn media(message: impl Into<String>) -> Self {
        Self::MediaAcquisitionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// `RecordNotFound`, `Config` and `DeliveryRejected` are not transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectivityUnavailable
                | Self::MediaAcquisitionFailed { .. }
                | Self::RateLimited { .. }
                | Self::Backend { .. }
                | Self::Storage { .. }
                | Self::Cancelled
        )
    }

    /// Whether shutdown interrupted the operation. The attempt did not run to
    /// completion and should not count against the record.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this is a rate-limit signal from the backend.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display_includes_hint() {
        let err = RelayError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.to_string(), "rate limited by backend (retry after 3s)");

        let err = RelayError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limited by backend");
    }

    #[test]
    fn transient_classification() {
        assert!(RelayError::ConnectivityUnavailable.is_transient());
        assert!(RelayError::RateLimited { retry_after: None }.is_transient());
        assert!(RelayError::media("download timed out").is_transient());
        assert!(RelayError::backend("connection reset").is_transient());

        assert!(!RelayError::rejected("chat not found").is_transient());
        assert!(!RelayError::RecordNotFound { what: "message 4".into() }.is_transient());
        assert!(!RelayError::Config("missing source".into()).is_transient());
    }

    #[test]
    fn cancellation_is_its_own_signal() {
        let err = RelayError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.is_transient());
        assert!(!err.is_rate_limited());
        assert!(!RelayError::RateLimited { retry_after: None }.is_cancelled());
    }

    #[test]
    fn only_rate_limited_reports_rate_limit() {
        assert!(RelayError::RateLimited { retry_after: None }.is_rate_limited());
        assert!(!RelayError::backend("timeout").is_rate_limited());
    }
}
