pub mod index;
pub mod plan;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hashsync_core::{config, ConfigOverrides, SyncConfig};

/// Flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file to use instead of `~/.hashsync/config.yaml`.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Target bucket.
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Folder (key prefix) inside the bucket; empty for the bucket root.
    #[arg(long, global = true)]
    pub folder: Option<String>,

    /// Local directory to mirror.
    #[arg(long = "local", global = true, value_name = "DIR")]
    pub local_root: Option<PathBuf>,

    /// Scratch directory for the index rebuild download.
    #[arg(long = "scratch", global = true, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Root directory of the filesystem object store.
    #[arg(long, global = true, value_name = "DIR")]
    pub store_root: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bucket: self.bucket.clone(),
            folder: self.folder.clone(),
            local_root: self.local_root.clone(),
            scratch_dir: self.scratch_dir.clone(),
            store_root: self.store_root.clone(),
        }
    }

    /// Resolve the effective config: file (explicit or default) plus flags.
    pub fn load_config(&self) -> Result<SyncConfig> {
        let overrides = self.overrides();
        let cfg = match &self.config {
            Some(path) => config::load_from(path, &overrides)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => config::load(&overrides).context("failed to load config")?,
        };
        tracing::debug!(
            "config: bucket={} folder={} local={}",
            cfg.bucket,
            cfg.folder,
            cfg.local_root.display()
        );
        Ok(cfg)
    }
}
