//! Boundary to whatever turns an entity into bytes on disk.

use std::path::Path;

use async_trait::async_trait;
use hdl_schema::{ProviderEntity, Sha256Digest};

use crate::error::ResolveError;

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Digest of the bytes written to the destination.
    pub sha256: Sha256Digest,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Resolves one entity to a local file.
///
/// Implementations must either leave a complete, verified file at `dest` and
/// return its digest, or fail and leave `dest` untouched.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Fetch `entity` into `dest`.
    async fn fetch(&self, entity: &ProviderEntity, dest: &Path) -> Result<Fetched, ResolveError>;
}
