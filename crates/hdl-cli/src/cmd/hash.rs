//! Hash command

use std::path::PathBuf;

use anyhow::{Context, Result};
use hdl_core::store::hash_file;

/// Print the SHA256 of each file, in manifest-ready form.
pub async fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = hash_file(file)
            .await
            .with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("sha256:{digest}  {}", file.display());
    }
    Ok(())
}
