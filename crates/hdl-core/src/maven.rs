//! The built-in loader phase: artifacts fetched from repositories using the
//! standard `group/artifact/version` layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hdl_schema::{EntityKind, ProviderEntity, Sha256Digest};

use crate::error::{PhaseError, ResolveError};
use crate::io::resolve::ArtifactResolver;
use crate::modules::ActivationContext;
use crate::phase::{LoaderPhase, PhaseState, TransformablePhase};
use crate::relocation::{self, Relocation, Relocator};
use crate::reporter::{Reporter, TracingReporter};
use crate::source::Source;
use crate::store::ArtifactStore;

/// An entity together with the file that currently backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The declared entity.
    pub entity: ProviderEntity,
    /// Downloaded file, or its relocated copy after `transform`.
    pub path: PathBuf,
    /// Digest of the downloaded bytes.
    pub sha256: Sha256Digest,
}

/// Downloads [`EntityKind::MAVEN`] entities into `<base>/maven`, optionally
/// relocates them, and activates them.
pub struct MavenPhase {
    store: ArtifactStore,
    resolver: Arc<dyn ArtifactResolver>,
    relocator: Option<Arc<dyn Relocator>>,
    rules: Arc<[Relocation]>,
    reporter: Arc<dyn Reporter>,
    state: PhaseState,
    staged: Vec<ProviderEntity>,
    resolved: Vec<Resolved>,
}

impl MavenPhase {
    /// Ordering key of this phase type.
    pub const PRIORITY: i32 = 0;

    /// Subdirectory of the engine base directory owned by this phase.
    pub const NAMESPACE: &'static str = "maven";

    /// Phase storing under `base` and fetching through `resolver`.
    pub fn new(base: &Path, resolver: impl ArtifactResolver + 'static) -> Self {
        Self::with_resolver(base, Arc::new(resolver))
    }

    /// Phase sharing an existing resolver.
    pub fn with_resolver(base: &Path, resolver: Arc<dyn ArtifactResolver>) -> Self {
        Self {
            store: ArtifactStore::new(base, Self::NAMESPACE),
            resolver,
            relocator: None,
            rules: Arc::from(Vec::new()),
            reporter: Arc::new(TracingReporter),
            state: PhaseState::Idle,
            staged: Vec::new(),
            resolved: Vec::new(),
        }
    }

    /// Fetch over HTTP from `repositories`, in order.
    #[cfg(feature = "network")]
    pub fn with_repositories(
        base: &Path,
        repositories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(base, crate::io::download::HttpResolver::new(repositories))
    }

    /// Enable the transform step with `rules`. An empty rule set leaves the
    /// phase non-transformable.
    pub fn with_relocator(mut self, relocator: Arc<dyn Relocator>, rules: Vec<Relocation>) -> Self {
        self.relocator = Some(relocator);
        self.rules = Arc::from(rules);
        self
    }

    /// Report progress to `reporter` instead of `tracing`.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// The store this phase writes to.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Entities staged by the last collection.
    pub fn staged(&self) -> &[ProviderEntity] {
        &self.staged
    }

    /// Entities materialized by the current invocation.
    pub fn resolved(&self) -> &[Resolved] {
        &self.resolved
    }

    fn begin(&self, to: PhaseState) -> Result<(), PhaseError> {
        if self.state.can_advance(to) {
            Ok(())
        } else {
            Err(PhaseError::OutOfOrder {
                from: self.state,
                to,
            })
        }
    }

    fn finish(&mut self, to: PhaseState, result: Result<(), PhaseError>) -> Result<(), PhaseError> {
        self.state = if result.is_ok() { to } else { PhaseState::Failed };
        result
    }

    async fn fetch_all(&self) -> Result<Vec<Resolved>, PhaseError> {
        let mut resolved = Vec::with_capacity(self.staged.len());
        for entity in &self.staged {
            let path = self.store.artifact_path(&entity.coordinates);

            let cached = self.store.cached(entity).await.map_err(ResolveError::from)?;
            let sha256 = if let Some(digest) = cached {
                self.reporter.cached(entity);
                digest
            } else {
                let fetched = self.resolver.fetch(entity, &path).await?;
                ArtifactStore::record(&path, &fetched.sha256)
                    .await
                    .map_err(ResolveError::from)?;
                self.reporter.downloaded(entity, fetched.bytes);
                fetched.sha256
            };

            resolved.push(Resolved {
                entity: entity.clone(),
                path,
                sha256,
            });
        }
        Ok(resolved)
    }

    async fn relocate_all(&mut self) -> Result<(), PhaseError> {
        let Some(relocator) = self.relocator.clone() else {
            return Ok(());
        };
        let fingerprint = relocation::fingerprint(&self.rules);

        for item in &mut self.resolved {
            let output =
                self.store
                    .relocated_path(&item.entity.coordinates, &fingerprint, &item.sha256);

            let present = tokio::fs::try_exists(&output)
                .await
                .map_err(crate::error::TransformError::from)?;
            if !present {
                relocation::relocate_file(
                    Arc::clone(&relocator),
                    &item.path,
                    &output,
                    Arc::clone(&self.rules),
                )
                .await?;
                self.reporter.relocated(&item.entity);
            }
            item.path = output;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MavenPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MavenPhase")
            .field("store", &self.store)
            .field("rules", &self.rules)
            .field("state", &self.state)
            .field("staged", &self.staged.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LoaderPhase for MavenPhase {
    fn name(&self) -> &'static str {
        Self::NAMESPACE
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn kind(&self) -> EntityKind {
        EntityKind::MAVEN
    }

    fn collect(&mut self, source: &Source) -> Result<(), PhaseError> {
        self.begin(PhaseState::Collected)?;
        let result = source.entities_for(&EntityKind::MAVEN).map(|entities| {
            tracing::debug!(count = entities.len(), "collected repository dependencies");
            self.staged = entities;
            self.resolved.clear();
        });
        self.finish(PhaseState::Collected, result.map_err(PhaseError::from))
    }

    async fn materialize(&mut self) -> Result<(), PhaseError> {
        self.begin(PhaseState::Materialized)?;
        let result = match self.fetch_all().await {
            Ok(resolved) => {
                self.resolved = resolved;
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.finish(PhaseState::Materialized, result)
    }

    fn as_transformable(&mut self) -> Option<&mut dyn TransformablePhase> {
        if self.relocator.is_some() && !self.rules.is_empty() {
            Some(self)
        } else {
            None
        }
    }

    async fn activate(&mut self, ctx: &ActivationContext) -> Result<(), PhaseError> {
        self.begin(PhaseState::Activated)?;
        let mut result = Ok(());
        for item in &self.resolved {
            if let Err(e) = ctx.activate(&item.entity, &item.path) {
                result = Err(e.into());
                break;
            }
            self.reporter.activated(&item.entity);
        }
        self.finish(PhaseState::Activated, result)
    }
}

#[async_trait]
impl TransformablePhase for MavenPhase {
    async fn transform(&mut self) -> Result<(), PhaseError> {
        self.begin(PhaseState::Transformed)?;
        let result = self.relocate_all().await;
        self.finish(PhaseState::Transformed, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::io::resolve::Fetched;
    use crate::modules::ModuleRegistry;
    use crate::source::StaticProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes the coordinates as the artifact body and counts calls.
    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactResolver for FakeResolver {
        async fn fetch(&self, entity: &ProviderEntity, dest: &Path) -> Result<Fetched, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = entity.coordinates.to_string();
            tokio::fs::create_dir_all(dest.parent().unwrap()).await?;
            tokio::fs::write(dest, &body).await?;
            Ok(Fetched {
                sha256: crate::store::hash_file(dest).await?,
                bytes: body.len() as u64,
            })
        }
    }

    /// Writes different bytes on every fetch.
    #[derive(Default)]
    struct Versioned {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactResolver for Versioned {
        async fn fetch(&self, entity: &ProviderEntity, dest: &Path) -> Result<Fetched, ResolveError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let body = format!("{}#{n}", entity.coordinates);
            tokio::fs::create_dir_all(dest.parent().unwrap()).await?;
            tokio::fs::write(dest, &body).await?;
            Ok(Fetched {
                sha256: crate::store::hash_file(dest).await?,
                bytes: body.len() as u64,
            })
        }
    }

    struct Prefix;

    impl Relocator for Prefix {
        fn relocate(
            &self,
            input: &Path,
            output: &Path,
            rules: &[Relocation],
        ) -> Result<(), TransformError> {
            let body = std::fs::read_to_string(input)?;
            let rewritten = rules.iter().fold(body, |acc, rule| {
                acc.replace(&rule.pattern, &rule.replacement)
            });
            std::fs::write(output, rewritten)?;
            Ok(())
        }
    }

    fn source() -> Source {
        Source::provider(StaticProvider::new(
            EntityKind::MAVEN,
            [
                ProviderEntity::maven("com.google.code.gson:gson:2.10.1", "com.google.gson").unwrap(),
                ProviderEntity::maven("org.slf4j:slf4j-api:2.0.9", "org.slf4j").unwrap(),
            ],
        ))
    }

    #[tokio::test]
    async fn test_full_cycle_and_cache_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let mut phase = MavenPhase::with_resolver(dir.path(), resolver.clone());
        let ctx = ActivationContext::new(Arc::new(ModuleRegistry::new()));

        for _ in 0..2 {
            phase.collect(&source()).unwrap();
            phase.materialize().await.unwrap();
            assert!(phase.as_transformable().is_none());
            phase.activate(&ctx).await.unwrap();
            assert_eq!(phase.state(), PhaseState::Activated);
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert!(ctx.modules().contains("com.google.gson"));
        assert!(ctx.modules().contains("org.slf4j"));
        assert_eq!(phase.store().list().len(), 2);
    }

    #[tokio::test]
    async fn test_pinned_digest_mismatch_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let mut phase = MavenPhase::with_resolver(dir.path(), resolver.clone());

        let entity = ProviderEntity::maven("org.example:lib:1.0", "lib")
            .unwrap()
            .with_sha256(Sha256Digest::new("0".repeat(64)).unwrap());
        let source = Source::provider(StaticProvider::new(EntityKind::MAVEN, [entity]));

        for _ in 0..2 {
            phase.collect(&source).unwrap();
            phase.materialize().await.unwrap();
        }
        // The stored bytes never match the pin, so nothing is reused.
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transform_relocates_once() {
        let dir = tempfile::tempdir().unwrap();
        let rules = vec![Relocation::new("com.google", "my.plugin.libs").unwrap()];
        let mut phase = MavenPhase::new(dir.path(), FakeResolver::default())
            .with_relocator(Arc::new(Prefix), rules);
        let ctx = ActivationContext::new(Arc::new(ModuleRegistry::new()));

        phase.collect(&source()).unwrap();
        phase.materialize().await.unwrap();
        phase.as_transformable().unwrap().transform().await.unwrap();
        phase.activate(&ctx).await.unwrap();

        let gson = ctx.modules().get("com.google.gson").unwrap();
        assert!(gson.path.starts_with(dir.path().join("maven").join("relocated")));
        assert_eq!(
            std::fs::read_to_string(&gson.path).unwrap(),
            "my.plugin.libs.code.gson:gson:2.10.1"
        );

        // Second invocation reuses the relocated output.
        phase.collect(&source()).unwrap();
        phase.materialize().await.unwrap();
        phase.as_transformable().unwrap().transform().await.unwrap();
        assert_eq!(phase.state(), PhaseState::Transformed);
    }

    #[tokio::test]
    async fn test_out_of_order_calls_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut phase = MavenPhase::new(dir.path(), FakeResolver::default());
        let ctx = ActivationContext::new(Arc::new(ModuleRegistry::new()));

        assert!(matches!(
            phase.materialize().await,
            Err(PhaseError::OutOfOrder { .. })
        ));
        phase.collect(&source()).unwrap();
        assert!(matches!(
            phase.activate(&ctx).await,
            Err(PhaseError::OutOfOrder { .. })
        ));
        assert_eq!(phase.state(), PhaseState::Collected);
    }

    #[tokio::test]
    async fn test_refetched_artifact_is_relocated_again() {
        let dir = tempfile::tempdir().unwrap();
        let rules = vec![Relocation::new("com.google", "my.plugin.libs").unwrap()];
        let mut phase = MavenPhase::new(dir.path(), Versioned::default())
            .with_relocator(Arc::new(Prefix), rules);
        let ctx = ActivationContext::new(Arc::new(ModuleRegistry::new()));
        let gson = ProviderEntity::maven("com.google.code.gson:gson:2.10.1", "com.google.gson").unwrap();
        let source = Source::provider(StaticProvider::new(EntityKind::MAVEN, [gson.clone()]));

        phase.collect(&source).unwrap();
        phase.materialize().await.unwrap();
        phase.as_transformable().unwrap().transform().await.unwrap();
        let first = phase.resolved()[0].path.clone();
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            "my.plugin.libs.code.gson:gson:2.10.1#1"
        );

        // Forget the recorded digest so the next run downloads new bytes.
        let artifact = phase.store().artifact_path(&gson.coordinates);
        std::fs::remove_file(ArtifactStore::digest_path(&artifact)).unwrap();

        phase.collect(&source).unwrap();
        phase.materialize().await.unwrap();
        phase.as_transformable().unwrap().transform().await.unwrap();
        phase.activate(&ctx).await.unwrap();

        let second = ctx.modules().get("com.google.gson").unwrap().path;
        assert_ne!(first, second);
        assert_eq!(
            std::fs::read_to_string(&second).unwrap(),
            "my.plugin.libs.code.gson:gson:2.10.1#2"
        );
    }
}
