//! Fetch command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use hdl_core::{Manifest, ModuleRegistry};

/// Fetch and activate everything `manifest_path` declares.
pub async fn fetch(manifest_path: &Path, base_dir: Option<PathBuf>) -> Result<()> {
    let manifest = Manifest::load(manifest_path).await?;
    let config = super::config(base_dir, Some(&manifest))?;

    if !config.relocations.is_empty() {
        tracing::warn!(
            rules = config.relocations.len(),
            "relocation rules require an embedding host with a relocator; skipping"
        );
    }

    let modules = Arc::new(ModuleRegistry::new());
    let engine = config.builder().modules(Arc::clone(&modules)).build();

    engine
        .load_all(manifest.source())
        .await
        .context("Failed to load dependencies")?;

    for module in modules.snapshot() {
        let coordinates = module.coordinates.to_string();
        println!(
            "  {:<32} {coordinates:<48} {}",
            module.target,
            module.path.display()
        );
    }
    println!(
        "{} dependencies ready in {}",
        modules.len(),
        config.base_dir.display()
    );
    Ok(())
}
