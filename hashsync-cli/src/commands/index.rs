//! `hashsync index`: print a directory's content index.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hashsync_sync::ContentIndexer;

/// Arguments for `hashsync index`.
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Directory to index (created if missing).
    pub dir: PathBuf,
}

impl IndexArgs {
    pub fn run(self) -> Result<()> {
        let mut indexer = ContentIndexer::new(&self.dir)
            .with_context(|| format!("cannot prepare '{}'", self.dir.display()))?;
        let index = indexer
            .index()
            .with_context(|| format!("failed to index '{}'", self.dir.display()))?;
        for (path, digest) in index {
            println!("{digest}  {path}");
        }
        Ok(())
    }
}
