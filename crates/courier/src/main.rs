// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - a reliable one-way chat relay.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod health;
mod queue;
mod serve;
mod shutdown;
mod supervisor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::{ConfigError, CourierConfig};

/// Courier - relays every message from one chat to another, queueing
/// whatever cannot be delivered right away.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Explicit config file (replaces the standard search path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay until SIGINT/SIGTERM.
    Serve,
    /// Inspect the delivery queue.
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// List records the drain loop will re-attempt.
    List {
        /// Maximum rows to print.
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Show the most recent records of any status instead.
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show the latest record for one source message.
    Show {
        /// Source chat id.
        #[arg(long, allow_hyphen_values = true)]
        chat: i64,
        /// Source message id.
        #[arg(long)]
        message: i64,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn load(path: Option<&std::path::Path>, validate: bool) -> CourierConfig {
    let loaded: Result<CourierConfig, Vec<ConfigError>> = match (path, validate) {
        (Some(path), true) => courier_config::load_and_validate_path(path),
        (None, true) => courier_config::load_and_validate(),
        (path, false) => courier_config::load_unvalidated(path),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => {
            let config = load(cli.config.as_deref(), true);
            serve::run_serve(config).await
        }
        Commands::Queue { command } => {
            let config = load(cli.config.as_deref(), false);
            match command {
                QueueCommand::List { limit, all, json } => {
                    queue::run_list(&config, limit, all, json).await
                }
                QueueCommand::Show {
                    chat,
                    message,
                    json,
                } => queue::run_show(&config, chat, message, json).await,
            }
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
