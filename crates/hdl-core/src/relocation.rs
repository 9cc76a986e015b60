//! Namespace relocation of materialized artifacts.
//!
//! The rewrite itself is supplied by the host through [`Relocator`]; this
//! module owns the rule set, its on-disk fingerprint, and running a
//! relocator off the async workers with an atomic rename into place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TransformError;
use crate::store::ArtifactStore;

/// Rename every symbol under `pattern` to live under `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relocation {
    /// Namespace prefix to move (e.g. `com.google.gson`).
    pub pattern: String,
    /// Private prefix to move it to (e.g. `my.plugin.libs.gson`).
    pub replacement: String,
}

impl Relocation {
    /// Validated rule.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidRule`] if either side is blank or
    /// both sides are equal.
    pub fn new(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self, TransformError> {
        let rule = Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check a rule that came from deserialization.
    ///
    /// # Errors
    ///
    /// See [`Relocation::new`].
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.pattern.trim().is_empty() || self.replacement.trim().is_empty() {
            return Err(TransformError::InvalidRule(format!(
                "'{}' -> '{}': empty side",
                self.pattern, self.replacement
            )));
        }
        if self.pattern == self.replacement {
            return Err(TransformError::InvalidRule(format!(
                "'{}' relocates onto itself",
                self.pattern
            )));
        }
        Ok(())
    }
}

/// Rewrites one artifact file.
///
/// Runs on a blocking thread. Must be deterministic: the same input and
/// rules always produce the same output, so re-running after a failed
/// startup never corrupts anything.
pub trait Relocator: Send + Sync {
    /// Write the rewritten form of `input` to `output`.
    fn relocate(&self, input: &Path, output: &Path, rules: &[Relocation]) -> Result<(), TransformError>;
}

/// Short stable identifier of a rule set, used as a directory name.
pub fn fingerprint(rules: &[Relocation]) -> String {
    let mut hasher = Sha256::new();
    for rule in rules {
        hasher.update(rule.pattern.as_bytes());
        hasher.update(b"=");
        hasher.update(rule.replacement.as_bytes());
        hasher.update(b"\n");
    }
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(16);
    hex
}

/// Run `relocator` on a blocking thread, writing to a partial file that is
/// renamed to `output` only on success.
///
/// # Errors
///
/// Returns whatever the relocator reports, or an IO/task error.
pub async fn relocate_file(
    relocator: Arc<dyn Relocator>,
    input: &Path,
    output: &Path,
    rules: Arc<[Relocation]>,
) -> Result<(), TransformError> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let input: PathBuf = input.to_path_buf();
    let partial = ArtifactStore::partial_path(output);
    let target = partial.clone();
    let result =
        tokio::task::spawn_blocking(move || relocator.relocate(&input, &target, &rules)).await?;

    if let Err(e) = result {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(e);
    }

    tokio::fs::rename(&partial, output).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Relocator for Upper {
        fn relocate(
            &self,
            input: &Path,
            output: &Path,
            _rules: &[Relocation],
        ) -> Result<(), TransformError> {
            let bytes = std::fs::read(input)?;
            std::fs::write(output, bytes.to_ascii_uppercase())?;
            Ok(())
        }
    }

    struct Broken;

    impl Relocator for Broken {
        fn relocate(
            &self,
            input: &Path,
            output: &Path,
            _rules: &[Relocation],
        ) -> Result<(), TransformError> {
            std::fs::write(output, b"half")?;
            Err(TransformError::Rewrite {
                path: input.to_path_buf(),
                message: "bad constant pool".to_string(),
            })
        }
    }

    #[test]
    fn test_rule_validation() {
        assert!(Relocation::new("com.google.gson", "my.libs.gson").is_ok());
        assert!(matches!(
            Relocation::new("", "my.libs"),
            Err(TransformError::InvalidRule(_))
        ));
        assert!(matches!(
            Relocation::new("a.b", "a.b"),
            Err(TransformError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_fingerprint_depends_on_rules() {
        let a = [Relocation::new("a", "x.a").unwrap()];
        let b = [Relocation::new("b", "x.b").unwrap()];
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 16);
    }

    #[tokio::test]
    async fn test_relocate_file_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.jar");
        std::fs::write(&input, b"gson").unwrap();
        let rules: Arc<[Relocation]> = Arc::from(vec![Relocation::new("a", "b").unwrap()]);

        let output = dir.path().join("out").join("in.jar");
        relocate_file(Arc::new(Upper), &input, &output, rules.clone())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"GSON");

        let failed = dir.path().join("out").join("broken.jar");
        let err = relocate_file(Arc::new(Broken), &input, &failed, rules)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Rewrite { .. }));
        assert!(!failed.exists());
        assert!(!ArtifactStore::partial_path(&failed).exists());
    }
}
