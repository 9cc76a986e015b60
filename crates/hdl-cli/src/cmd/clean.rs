//! Clean command

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Remove the local store.
pub async fn clean(base_dir: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let config = super::config(base_dir, None)?;
    let store = super::store(&config);
    let count = store.list().len();

    if dry_run {
        println!("Would remove {count} artifacts from {}", store.root().display());
        return Ok(());
    }

    store
        .clear()
        .await
        .with_context(|| format!("Failed to remove {}", store.root().display()))?;
    println!("Removed {count} artifacts.");
    Ok(())
}
