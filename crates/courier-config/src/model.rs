// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section defaults; `relay.source`,
/// `relay.destination` and `telegram.bot_token` are checked by validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Source and destination surfaces, logging.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Telegram backend credentials.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Queue database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Drain loop and retention settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Reachability probe settings.
    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Rate-limit backoff settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Temporary media storage.
    #[serde(default)]
    pub media: MediaConfig,

    /// HTTP status surface.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Which surfaces to relay between.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Source chat: numeric id or `@username`.
    #[serde(default)]
    pub source: Option<String>,

    /// Destination chat: numeric id (bare or `-100` prefixed) or `@username`.
    #[serde(default)]
    pub destination: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Per-request timeout for Bot API calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How many recently observed messages are kept for re-fetching by id.
    #[serde(default = "default_message_cache_size")]
    pub message_cache_size: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            message_cache_size: default_message_cache_size(),
        }
    }
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_message_cache_size() -> usize {
    1000
}

/// Queue database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("message_queue.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("message_queue.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Drain loop and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Seconds between drain passes.
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    /// Maximum records re-attempted per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Failed attempts after which a record is no longer selected.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Age after which non-pending records are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval_secs(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retention_days: default_retention_days(),
        }
    }
}

impl QueueConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }
}

fn default_drain_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retention_days() -> u32 {
    1
}

/// Reachability probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// Highly available endpoint probed with a GET.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Probe timeout.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Sleep before re-checking after the drain loop finds the network down.
    #[serde(default = "default_offline_backoff_secs")]
    pub offline_backoff_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            timeout_secs: default_probe_timeout_secs(),
            offline_backoff_secs: default_offline_backoff_secs(),
        }
    }
}

impl ConnectivityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn offline_backoff(&self) -> Duration {
        Duration::from_secs(self.offline_backoff_secs)
    }
}

fn default_probe_url() -> String {
    "https://1.1.1.1".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_offline_backoff_secs() -> u64 {
    60
}

/// Rate-limit backoff configuration for the delivery executor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Total attempts (including the first) when the backend rate-limits us.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay (a larger retry-after hint wins).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// Temporary media storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory media is downloaded into. Removed on clean shutdown.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_temp_dir() -> String {
    std::env::temp_dir()
        .join("courier-media")
        .to_string_lossy()
        .into_owned()
}

/// HTTP status surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Serve `/`, `/health` and `/start`.
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_health_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_host() -> String {
    "127.0.0.1".to_string()
}

fn default_health_port() -> u16 {
    8080
}
