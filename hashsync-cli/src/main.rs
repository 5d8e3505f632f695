//! hashsync: mirror a local directory into an object-store folder by content hash.
//!
//! # Usage
//!
//! ```text
//! hashsync sync [--dry-run]
//! hashsync plan [--json]
//! hashsync index <dir>
//! ```
//!
//! Global flags (`--config`, `--bucket`, `--folder`, `--local`, `--scratch`,
//! `--store-root`, `--verbose`) may appear before or after the subcommand.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{index::IndexArgs, plan::PlanArgs, sync::SyncArgs, GlobalArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hashsync",
    version,
    about = "Sync a local directory to an object store by content hash",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload changed files, delete removed ones, publish the new index.
    Sync(SyncArgs),

    /// Show what `sync` would do without touching the store.
    Plan(PlanArgs),

    /// Print the content index of a local directory.
    Index(IndexArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    match cli.command {
        Commands::Sync(args) => args.run(&cli.global),
        Commands::Plan(args) => args.run(&cli.global),
        Commands::Index(args) => args.run(),
    }
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
