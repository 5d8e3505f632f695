//! `hashsync sync`: run the full pipeline.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use hashsync_sync::{
    pipeline::{self, SyncOptions, SyncReport},
    store, BootstrapSource,
};

use super::GlobalArgs;

/// Arguments for `hashsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Compute and print the plan without changing the store.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let cfg = global.load_config()?;
        let store = store::open(&cfg);
        let report = pipeline::run(
            store.as_ref(),
            &cfg,
            SyncOptions {
                dry_run: self.dry_run,
            },
        )
        .with_context(|| format!("sync failed for {}/{}", cfg.bucket, cfg.folder))?;

        print_report(&report);
        Ok(())
    }
}

pub(crate) fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let scope = format!("{}/{}", report.bucket, report.folder);

    if let BootstrapSource::Rebuilt { reason } = &report.bootstrap {
        println!("{prefix}remote index rebuilt ({reason})");
    }

    print_plan_lines(report);

    let plan = &report.plan;
    if plan.is_empty() {
        println!("{prefix}✓ '{scope}' — nothing to do");
    } else if report.dry_run {
        println!(
            "{prefix}'{scope}' would upload {}, delete {}",
            plan.to_upload.len(),
            plan.to_delete.len()
        );
    } else {
        println!(
            "✓ '{scope}' synced ({} uploaded, {} deleted)",
            report.applied.uploaded, report.applied.deleted
        );
    }
    if let Some(generation) = report.published_generation {
        println!("  index generation {generation}");
    }
}

pub(crate) fn print_plan_lines(report: &SyncReport) {
    for path in &report.plan.to_delete {
        println!("  {} {path}", "-".red());
    }
    for path in &report.plan.to_upload {
        println!("  {} {path}", "+".green());
    }
}
