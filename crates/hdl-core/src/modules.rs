//! Process-wide registry of activated modules.
//!
//! Activation is the last step of a phase: it records which artifact on disk
//! provides which module name. The registry is filled during startup and
//! only read afterwards; entries are never removed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use hdl_schema::{Coordinates, ProviderEntity, Sha256Digest};
use indexmap::IndexMap;

use crate::error::ActivationError;

static GLOBAL: LazyLock<Arc<ModuleRegistry>> = LazyLock::new(|| Arc::new(ModuleRegistry::new()));

/// An artifact that has been made available to the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    /// Module name the artifact provides.
    pub target: String,
    /// Where the artifact came from.
    pub coordinates: Coordinates,
    /// File on disk backing the module.
    pub path: PathBuf,
    /// Digest the declaration pinned, if any.
    pub sha256: Option<Sha256Digest>,
}

impl LoadedModule {
    /// Describe `entity` as backed by `path`.
    pub fn new(entity: &ProviderEntity, path: impl Into<PathBuf>) -> Self {
        Self {
            target: entity.target.clone(),
            coordinates: entity.coordinates.clone(),
            path: path.into(),
            sha256: entity.sha256.clone(),
        }
    }

    /// Whether `other` names the same artifact. Copies in different engine
    /// base directories are the same artifact; differing pins are not.
    pub fn same_artifact(&self, other: &Self) -> bool {
        if self.coordinates != other.coordinates {
            return false;
        }
        match (&self.sha256, &other.sha256) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// Insertion-ordered map from module name to its backing artifact.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<IndexMap<String, LoadedModule>>,
}

impl ModuleRegistry {
    /// An empty registry, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every engine in this process.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Record `module`. Returns `false` if the same artifact already provides
    /// the target, so repeated startups and several engines sharing one
    /// process are harmless.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Conflict`] if a different artifact already
    /// provides the target, or [`ActivationError::Poisoned`] if a writer
    /// panicked while holding the lock.
    pub fn insert(&self, module: LoadedModule) -> Result<bool, ActivationError> {
        let mut modules = self
            .modules
            .write()
            .map_err(|_| ActivationError::Poisoned)?;

        if let Some(existing) = modules.get(&module.target) {
            if existing.same_artifact(&module) {
                return Ok(false);
            }
            return Err(ActivationError::Conflict {
                target: module.target,
                existing: existing.coordinates.clone(),
                incoming: module.coordinates,
            });
        }

        modules.insert(module.target.clone(), module);
        Ok(true)
    }

    /// Look up the artifact providing `target`.
    pub fn get(&self, target: &str) -> Option<LoadedModule> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned()
    }

    /// Whether `target` has been activated.
    pub fn contains(&self, target: &str) -> bool {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }

    /// Number of activated modules.
    pub fn len(&self) -> usize {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been activated yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All activated modules, in activation order.
    pub fn snapshot(&self) -> Vec<LoadedModule> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// What a phase's `activate` step is allowed to touch.
#[derive(Debug, Clone)]
pub struct ActivationContext {
    modules: Arc<ModuleRegistry>,
}

impl ActivationContext {
    /// Context writing into `modules`.
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self { modules }
    }

    /// The registry this context writes into.
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Activate `entity` backed by the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::MissingArtifact`] if `path` is not a file,
    /// or any error from [`ModuleRegistry::insert`].
    pub fn activate(&self, entity: &ProviderEntity, path: &Path) -> Result<bool, ActivationError> {
        if !path.is_file() {
            return Err(ActivationError::MissingArtifact(path.to_path_buf()));
        }
        let added = self.modules.insert(LoadedModule::new(entity, path))?;
        if added {
            tracing::debug!(target_module = %entity.target, path = %path.display(), "activated");
        }
        Ok(added)
    }
}

impl Default for ActivationContext {
    fn default() -> Self {
        Self::new(ModuleRegistry::global())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(target: &str) -> ProviderEntity {
        ProviderEntity::maven("org.example:lib:1.0", target).unwrap()
    }

    #[test]
    fn test_insert_is_idempotent_for_same_artifact() {
        let registry = ModuleRegistry::new();
        let module = LoadedModule::new(&entity("lib"), "/tmp/lib-1.0.jar");

        assert!(registry.insert(module.clone()).unwrap());
        assert!(!registry.insert(module).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_coordinates_from_another_base_dir() {
        let registry = ModuleRegistry::new();
        assert!(
            registry
                .insert(LoadedModule::new(&entity("lib"), "/host1/maven/lib-1.0.jar"))
                .unwrap()
        );
        assert!(
            !registry
                .insert(LoadedModule::new(&entity("lib"), "/host2/maven/lib-1.0.jar"))
                .unwrap()
        );
        assert_eq!(
            registry.get("lib").unwrap().path,
            PathBuf::from("/host1/maven/lib-1.0.jar")
        );
    }

    #[test]
    fn test_insert_conflict() {
        let registry = ModuleRegistry::new();
        registry
            .insert(LoadedModule::new(&entity("lib"), "/a/lib.jar"))
            .unwrap();

        let other_version = ProviderEntity::maven("org.example:lib:2.0", "lib").unwrap();
        let err = registry
            .insert(LoadedModule::new(&other_version, "/a/lib-2.0.jar"))
            .unwrap_err();
        assert!(matches!(err, ActivationError::Conflict { .. }));

        let pinned = |hex: &str| {
            entity("lib").with_sha256(Sha256Digest::new(hex.repeat(64)).unwrap())
        };
        let registry = ModuleRegistry::new();
        registry
            .insert(LoadedModule::new(&pinned("a"), "/a/lib.jar"))
            .unwrap();
        assert!(matches!(
            registry.insert(LoadedModule::new(&pinned("b"), "/b/lib.jar")),
            Err(ActivationError::Conflict { .. })
        ));
        assert_eq!(registry.get("lib").unwrap().path, PathBuf::from("/a/lib.jar"));
    }

    #[test]
    fn test_activate_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ActivationContext::new(Arc::new(ModuleRegistry::new()));

        let missing = dir.path().join("missing.jar");
        assert!(matches!(
            ctx.activate(&entity("lib"), &missing),
            Err(ActivationError::MissingArtifact(_))
        ));

        let present = dir.path().join("lib.jar");
        std::fs::write(&present, b"PK").unwrap();
        assert!(ctx.activate(&entity("lib"), &present).unwrap());
        assert!(ctx.modules().contains("lib"));
    }
}
