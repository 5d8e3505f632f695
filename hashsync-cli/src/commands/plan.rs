//! `hashsync plan`: dry-run that prints only the reconciliation.

use anyhow::{Context, Result};
use clap::Args;

use hashsync_sync::{
    pipeline::{self, SyncOptions},
    store,
};

use super::{sync::print_plan_lines, GlobalArgs};

/// Arguments for `hashsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Emit the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let cfg = global.load_config()?;
        let store = store::open(&cfg);
        let report = pipeline::run(store.as_ref(), &cfg, SyncOptions { dry_run: true })
            .with_context(|| format!("plan failed for {}/{}", cfg.bucket, cfg.folder))?;

        if self.json {
            let json = serde_json::to_string_pretty(&report.plan)
                .context("failed to serialize plan")?;
            println!("{json}");
        } else {
            print_plan_lines(&report);
        }
        Ok(())
    }
}
