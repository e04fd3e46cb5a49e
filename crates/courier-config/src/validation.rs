// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every problem instead of failing fast, so a misconfigured
//! deployment sees all of them at once.

use courier_core::normalize_destination;

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if is_blank(config.relay.source.as_deref()) {
        errors.push(ConfigError::MissingKey {
            key: "relay.source".to_string(),
        });
    }

    match config.relay.destination.as_deref() {
        dest if is_blank(dest) => errors.push(ConfigError::MissingKey {
            key: "relay.destination".to_string(),
        }),
        Some(dest) => {
            if let Err(e) = normalize_destination(dest) {
                errors.push(ConfigError::Validation {
                    message: format!("relay.destination: {e}"),
                });
            }
        }
        None => {}
    }

    if is_blank(config.telegram.bot_token.as_deref()) {
        errors.push(ConfigError::MissingKey {
            key: "telegram.bot_token".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.media.temp_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "media.temp_dir must not be empty".to_string(),
        });
    }

    let positive = [
        ("queue.drain_interval_secs", config.queue.drain_interval_secs),
        ("queue.batch_size", u64::from(config.queue.batch_size)),
        ("queue.max_retries", u64::from(config.queue.max_retries)),
        ("connectivity.timeout_secs", config.connectivity.timeout_secs),
        ("delivery.max_attempts", u64::from(config.delivery.max_attempts)),
        ("telegram.request_timeout_secs", config.telegram.request_timeout_secs),
    ];
    for (key, value) in positive {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be greater than 0"),
            });
        }
    }

    if config.delivery.base_delay_ms > config.delivery.max_delay_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "delivery.base_delay_ms ({}) must not exceed delivery.max_delay_ms ({})",
                config.delivery.base_delay_ms, config.delivery.max_delay_ms
            ),
        });
    }

    if !config.connectivity.probe_url.starts_with("http://")
        && !config.connectivity.probe_url.starts_with("https://")
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "connectivity.probe_url `{}` must be an http(s) URL",
                config.connectivity.probe_url
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
