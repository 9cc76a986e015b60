//! `hdl.toml` manifests and engine configuration.
//!
//! A manifest declares what to fetch and where from:
//!
//! ```toml
//! [engine]
//! base_dir = "libs"
//!
//! [[repository]]
//! url = "https://repo1.maven.org/maven2"
//!
//! [[dependency]]
//! coordinates = "com.google.code.gson:gson:2.10.1"
//! target = "com.google.gson"
//!
//! [[relocation]]
//! pattern = "com.google.gson"
//! replacement = "my.plugin.libs.gson"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hdl_schema::{EntityKind, ProviderEntity};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::engine::{Engine, EngineBuilder};
use crate::paths;
use crate::relocation::Relocation;
use crate::source::{Source, StaticProvider};

/// Conventional manifest file name.
pub const MANIFEST_FILE: &str = "hdl.toml";

/// Overrides the HDL home directory (base dir is `$HDL_HOME/dependencies`).
pub const HOME_VAR: &str = "HDL_HOME";

/// Comma separated repository URLs, tried in order.
pub const REPOSITORIES_VAR: &str = "HDL_REPOSITORIES";

/// Parsed `hdl.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// `[engine]` settings.
    pub engine: EngineSection,
    /// `[[repository]]` entries in lookup order.
    #[serde(rename = "repository")]
    pub repositories: Vec<Repository>,
    /// `[[dependency]]` entries.
    #[serde(rename = "dependency")]
    pub dependencies: Vec<ProviderEntity>,
    /// `[[relocation]]` rules.
    #[serde(rename = "relocation")]
    pub relocations: Vec<Relocation>,
}

/// The `[engine]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Where downloaded artifacts are kept.
    pub base_dir: Option<PathBuf>,
}

/// A `[[repository]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Repository {
    /// Repository root URL.
    pub url: String,
}

impl Manifest {
    /// Read and validate a manifest.
    ///
    /// A relative `base_dir` is taken relative to the manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`Manifest::validate`].
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut manifest = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(dir) = &manifest.engine.base_dir {
            if dir.is_relative() {
                let root = path.parent().unwrap_or_else(|| Path::new("."));
                manifest.engine.base_dir = Some(root.join(dir));
            }
        }

        Ok(manifest)
    }

    /// Parse and validate manifest text.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or an invalid entry.
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check entries that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid repository, dependency or
    /// relocation rule.
    pub fn validate(&self) -> Result<()> {
        for repo in &self.repositories {
            if !(repo.url.starts_with("https://") || repo.url.starts_with("http://")) {
                bail!("repository url must be http(s): {}", repo.url);
            }
        }
        for entity in &self.dependencies {
            entity
                .validate()
                .with_context(|| format!("invalid dependency {entity}"))?;
        }
        for rule in &self.relocations {
            rule.validate()?;
        }
        Ok(())
    }

    /// The declared dependencies as a [`Source`], one provider per kind in
    /// first-seen order.
    pub fn source(&self) -> Source {
        let mut by_kind: IndexMap<EntityKind, Vec<ProviderEntity>> = IndexMap::new();
        for entity in &self.dependencies {
            by_kind
                .entry(entity.kind.clone())
                .or_default()
                .push(entity.clone());
        }
        by_kind
            .into_iter()
            .fold(Source::default(), |source, (kind, entities)| {
                source.with_provider(StaticProvider::new(kind, entities))
            })
    }
}

/// Effective engine settings.
///
/// Each setting is taken from the environment, then the manifest, then the
/// built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine base directory.
    pub base_dir: PathBuf,
    /// Repository URLs; empty means Maven Central.
    pub repositories: Vec<String>,
    /// Relocation rules for hosts that supply a relocator.
    pub relocations: Vec<Relocation>,
}

impl EngineConfig {
    /// Settings from the process environment alone.
    ///
    /// # Errors
    ///
    /// Returns an error if no base directory can be determined.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None)
    }

    /// Settings from the process environment layered over `manifest`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base directory can be determined.
    pub fn resolve(manifest: Option<&Manifest>) -> Result<Self> {
        Self::layered(|key| std::env::var(key).ok(), manifest)
    }

    fn layered(env: impl Fn(&str) -> Option<String>, manifest: Option<&Manifest>) -> Result<Self> {
        let home_override = env(HOME_VAR).filter(|v| !v.is_empty());
        let from_manifest = manifest.and_then(|m| m.engine.base_dir.clone());
        let base_dir = match (home_override, from_manifest) {
            (None, Some(dir)) => dir,
            (home_override, _) => paths::hdl_home(home_override)
                .map(|home| paths::base_dir_in(&home))
                .context("Could not determine home directory; set HDL_HOME")?,
        };

        let repositories = match env(REPOSITORIES_VAR) {
            Some(list) => split_list(&list),
            None => manifest
                .map(|m| m.repositories.iter().map(|r| r.url.clone()).collect())
                .unwrap_or_default(),
        };

        Ok(Self {
            base_dir,
            repositories,
            relocations: manifest.map(|m| m.relocations.clone()).unwrap_or_default(),
        })
    }

    /// Engine builder carrying these settings.
    pub fn builder(&self) -> EngineBuilder {
        Engine::builder(self.base_dir.clone()).repositories(self.repositories.iter().cloned())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
