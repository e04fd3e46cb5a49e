// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Courier relay.
//!
//! TOML configuration with strict `deny_unknown_fields` parsing, XDG file
//! hierarchy lookup, `COURIER_*` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use courier_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("relaying to {:?}", config.relay.destination);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CourierConfig;

/// Load configuration from the standard hierarchy and validate it.
///
/// Missing source, destination or credentials are reported here, which makes
/// them fatal at startup.
pub fn load_and_validate() -> Result<CourierConfig, Vec<ConfigError>> {
    finish(loader::load_config())
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<CourierConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path))
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<CourierConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content))
}

/// Load configuration without validating it.
///
/// For commands that only read the queue database and need no credentials.
pub fn load_unvalidated(path: Option<&std::path::Path>) -> Result<CourierConfig, Vec<ConfigError>> {
    match path {
        Some(path) => loader::load_config_from_path(path),
        None => loader::load_config(),
    }
    .map_err(diagnostic::figment_to_config_errors)
}

fn finish(
    loaded: Result<CourierConfig, figment::Error>,
) -> Result<CourierConfig, Vec<ConfigError>> {
    let config = loaded.map_err(diagnostic::figment_to_config_errors)?;
    validation::validate_config(&config)?;
    Ok(config)
}
