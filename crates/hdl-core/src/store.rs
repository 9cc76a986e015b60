//! Local artifact storage for one phase namespace.
//!
//! Layout under `<base>/<namespace>/`:
//!
//! ```text
//! org/example/lib/1.0/lib-1.0.jar          # artifact bytes
//! org/example/lib/1.0/lib-1.0.jar.sha256   # digest recorded at download
//! relocated/<rules>/<input>/org/example/... # rewritten copies
//! ```
//!
//! The layout only depends on coordinates, so it is stable across runs and
//! a present artifact with a matching digest is never fetched again.

use std::io;
use std::path::{Path, PathBuf};

use hdl_schema::{Coordinates, ProviderEntity, Sha256Digest};
use sha2::{Digest, Sha256};

use crate::paths::{join_layout, namespace_dir};

const DIGEST_SUFFIX: &str = "sha256";
const PARTIAL_SUFFIX: &str = "part";
const RELOCATED_DIR: &str = "relocated";
const INPUT_PREFIX_LEN: usize = 16;

/// Filesystem store owned by one phase.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `<base>/<namespace>`.
    pub fn new(base: &Path, namespace: &str) -> Self {
        Self {
            root: namespace_dir(base, namespace),
        }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `coordinates` is kept.
    pub fn artifact_path(&self, coordinates: &Coordinates) -> PathBuf {
        join_layout(&self.root, &coordinates.repository_path())
    }

    /// Where the rewritten copy of the artifact with digest `input` under a
    /// rule set is kept. A refetched artifact with new bytes never maps to a
    /// stale copy.
    pub fn relocated_path(
        &self,
        coordinates: &Coordinates,
        fingerprint: &str,
        input: &Sha256Digest,
    ) -> PathBuf {
        let input = &input.as_str()[..INPUT_PREFIX_LEN];
        join_layout(
            &self.root.join(RELOCATED_DIR).join(fingerprint).join(input),
            &coordinates.repository_path(),
        )
    }

    /// Temporary download target next to `path`.
    pub fn partial_path(path: &Path) -> PathBuf {
        with_suffix(path, PARTIAL_SUFFIX)
    }

    /// Digest sidecar of `path`.
    pub fn digest_path(path: &Path) -> PathBuf {
        with_suffix(path, DIGEST_SUFFIX)
    }

    /// Returns the digest of a stored artifact if it is present and matches
    /// the expected identity: the declared digest when the entity pins one,
    /// otherwise the digest recorded when it was downloaded.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the artifact exists but cannot be read.
    pub async fn cached(&self, entity: &ProviderEntity) -> io::Result<Option<Sha256Digest>> {
        let path = self.artifact_path(&entity.coordinates);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        let expected = match &entity.sha256 {
            Some(declared) => Some(declared.clone()),
            None => read_digest(&Self::digest_path(&path)).await,
        };
        let Some(expected) = expected else {
            return Ok(None);
        };

        let actual = hash_file(&path).await?;
        if actual == expected {
            Ok(Some(actual))
        } else {
            tracing::warn!(
                path = %path.display(),
                %expected,
                %actual,
                "stored artifact does not match, fetching again"
            );
            Ok(None)
        }
    }

    /// Record the digest of a stored artifact.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the sidecar cannot be written.
    pub async fn record(path: &Path, digest: &Sha256Digest) -> io::Result<()> {
        tokio::fs::write(Self::digest_path(path), digest.as_str()).await
    }

    /// Every artifact in the store (sidecars and partial downloads excluded).
    pub fn list(&self) -> Vec<PathBuf> {
        let mut artifacts: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                !p.extension()
                    .is_some_and(|ext| ext == DIGEST_SUFFIX || ext == PARTIAL_SUFFIX)
            })
            .collect();
        artifacts.sort();
        artifacts
    }

    /// Remove the whole store.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory exists but cannot be removed.
    pub async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Compute the SHA256 of a file on a blocking thread.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub async fn hash_file(path: &Path) -> io::Result<Sha256Digest> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        use std::io::Read;
        let mut hasher = Sha256::new();
        let mut file = std::fs::File::open(&path)?;
        let mut buffer = [0u8; 8192];
        loop {
            let count = file.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
        }
        Sha256Digest::new(hex::encode(hasher.finalize())).map_err(io::Error::other)
    })
    .await
    .map_err(io::Error::other)?
}

async fn read_digest(path: &Path) -> Option<Sha256Digest> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    Sha256Digest::new(content.trim()).ok()
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn entity() -> ProviderEntity {
        ProviderEntity::maven("org.example:lib:1.0", "lib").unwrap()
    }

    async fn put(store: &ArtifactStore, bytes: &[u8]) -> PathBuf {
        let path = store.artifact_path(&entity().coordinates);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_layout_is_namespaced() {
        let store = ArtifactStore::new(Path::new("/deps"), "maven");
        assert_eq!(
            store.artifact_path(&entity().coordinates),
            Path::new("/deps/maven/org/example/lib/1.0/lib-1.0.jar")
        );
        assert_eq!(
            store.relocated_path(
                &entity().coordinates,
                "abc",
                &Sha256Digest::new("ab".repeat(32)).unwrap()
            ),
            Path::new("/deps/maven/relocated/abc/abababababababab/org/example/lib/1.0/lib-1.0.jar")
        );
    }

    #[tokio::test]
    async fn test_cached_requires_known_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "maven");
        let path = put(&store, b"hello").await;

        // No declared digest and no sidecar: unknown identity.
        assert!(store.cached(&entity()).await.unwrap().is_none());

        let digest = Sha256Digest::new(HELLO_SHA).unwrap();
        ArtifactStore::record(&path, &digest).await.unwrap();
        assert_eq!(store.cached(&entity()).await.unwrap(), Some(digest));
    }

    #[tokio::test]
    async fn test_cached_rejects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "maven");
        put(&store, b"tampered").await;

        let pinned = entity().with_sha256(Sha256Digest::new(HELLO_SHA).unwrap());
        assert!(store.cached(&pinned).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_skips_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "maven");
        let path = put(&store, b"hello").await;
        ArtifactStore::record(&path, &Sha256Digest::new(HELLO_SHA).unwrap())
            .await
            .unwrap();

        assert_eq!(store.list(), vec![path]);
        store.clear().await.unwrap();
        assert!(store.list().is_empty());
        store.clear().await.unwrap();
    }
}
