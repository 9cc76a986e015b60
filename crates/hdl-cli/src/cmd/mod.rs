//! Subcommand implementations.

pub mod clean;
pub mod fetch;
pub mod hash;
pub mod list;

use std::path::PathBuf;

use anyhow::Result;
use hdl_core::{ArtifactStore, EngineConfig, MavenPhase};

/// Effective configuration with a `--base-dir` override applied.
pub(crate) fn config(base_dir: Option<PathBuf>, manifest: Option<&hdl_core::Manifest>) -> Result<EngineConfig> {
    let mut config = EngineConfig::resolve(manifest)?;
    if let Some(dir) = base_dir {
        config.base_dir = dir;
    }
    Ok(config)
}

/// The store the built-in repository phase writes to.
pub(crate) fn store(config: &EngineConfig) -> ArtifactStore {
    ArtifactStore::new(&config.base_dir, MavenPhase::NAMESPACE)
}
