/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Storesync CLI - operator interface for the storesync queue engine.
//!
//! Covers the sanctioned operator actions (retry, mark-success, purge) and
//! the observability reads (status, rates). Draining is not exposed here:
//! executing tasks requires the host application's executor registry, so
//! drain runs stay a library call.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storesync::{Database, DAL};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Storesync - durable task queue for store/backoffice synchronization
#[derive(Parser)]
#[command(name = "storesync-ctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL or path (can also be set via DATABASE_URL environment variable)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show queue depth per status and the most recent failures
    Status {
        /// Number of recent failed tasks to list
        #[arg(long, default_value_t = 10)]
        failures: i64,
    },
    /// Show incoming/processed throughput for a trailing window
    Rates {
        /// Window length, e.g. "1h", "30m", "24h"
        #[arg(long, default_value = "1h")]
        window: String,
    },
    /// Apply the retention policy to the task and webhook-log stores
    Purge,
    /// Reset failed tasks back to pending so the next drain re-runs them
    Retry {
        /// Task ids to retry
        ids: Vec<i64>,

        /// Retry every failed task
        #[arg(long, conflicts_with = "ids")]
        all_failed: bool,
    },
    /// Force failed tasks to success without re-executing (the effect has
    /// been verified out-of-band)
    MarkSuccess {
        /// Task ids to mark
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let database_url = cli.database_url.context(
        "Database URL is required. Set --database-url or the DATABASE_URL environment variable",
    )?;
    let database = Database::new(&database_url);
    database
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    let dal = DAL::new(database);

    match cli.command {
        Commands::Status { failures } => commands::status::run(&dal, failures).await?,
        Commands::Rates { window } => commands::rates::run(&dal, &window).await?,
        Commands::Purge => commands::purge::run(&dal).await?,
        Commands::Retry { ids, all_failed } => {
            commands::tasks::retry(&dal, ids, all_failed).await?
        }
        Commands::MarkSuccess { ids } => commands::tasks::mark_success(&dal, ids).await?,
    }

    Ok(())
}
