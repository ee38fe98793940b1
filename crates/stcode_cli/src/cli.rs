//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Operator CLI for the sequence code store.
#[derive(Debug, Parser)]
#[command(name = "stcode", version, about = "Assign and repair ST sequence codes")]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "stcode.sqlite3")]
    pub db: PathBuf,
    /// JSON allocator config (windows, max_attempts).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides `max_attempts` from the config.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,
    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Health check.
    Ping,
    /// Print the canonical form of a code.
    Normalize { raw: String },
    /// Create a record, allocating a code unless `--code` is given.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Show the record holding a code.
    Get { code: String },
    /// List records in creation order.
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Delete the record holding a code.
    Delete { code: String },
    /// Repair duplicate codes across the whole store.
    Reconcile {
        /// Re-create the unique code index after a clean sweep.
        #[arg(long)]
        ensure_index: bool,
    },
}
