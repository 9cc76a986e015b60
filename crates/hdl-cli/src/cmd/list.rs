//! List command

use std::path::PathBuf;

use anyhow::Result;

/// List artifacts in the local store.
pub fn list(base_dir: Option<PathBuf>) -> Result<()> {
    let config = super::config(base_dir, None)?;
    let store = super::store(&config);
    let artifacts = store.list();

    if artifacts.is_empty() {
        println!();
        println!("  No artifacts stored in {}.", store.root().display());
        println!("  Run 'hdl fetch' to get started.");
        return Ok(());
    }

    let mut total_size: u64 = 0;
    for path in &artifacts {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        total_size += size;
        let shown = path.strip_prefix(store.root()).unwrap_or(path);
        println!("  {:<72} {size:>10}", shown.display());
    }
    println!();
    println!("  {} artifacts, {total_size} bytes", artifacts.len());
    Ok(())
}
