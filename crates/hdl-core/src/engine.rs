//! The loader engine.
//!
//! Owns the phase registry and runs every phase, lowest priority first, as
//! one task on a shared multi-thread runtime:
//!
//! ```text
//! load_all(source) --spawn--> route --> [phase 1: collect, materialize, (transform), activate]
//!        |                              [phase 2: ...]
//!        v                              first error short-circuits
//!    LoadTask  <--------------------------- Result<(), LoadError>
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use hdl_schema::EntityKind;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::error::{LoadError, PhaseError, Step};
use crate::modules::{ActivationContext, ModuleRegistry};
use crate::phase::{LoaderPhase, PhaseKey};
use crate::registry::{PhaseRegistry, RegisteredPhase};
use crate::relocation::{Relocation, Relocator};
use crate::reporter::{Reporter, TracingReporter};
use crate::source::Source;

static SHARED_RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();

/// Handle of the process-wide loader runtime, started on first use.
fn shared_handle() -> Result<Handle, LoadError> {
    SHARED_RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .thread_name("hdl-loader")
                .enable_all()
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map(|rt| rt.handle().clone())
        .map_err(|e| LoadError::Runtime(e.clone()))
}

/// Runs registered loader phases against a [`Source`].
///
/// Register phases before the first `load_all`; a run works on a snapshot
/// of the registry taken when it is scheduled.
pub struct Engine {
    base_dir: PathBuf,
    phases: PhaseRegistry,
    reporter: Arc<dyn Reporter>,
    modules: Arc<ModuleRegistry>,
}

impl Engine {
    /// Engine with the default phases, storing under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::builder(base_dir).build()
    }

    /// Configure an engine before building it.
    pub fn builder(base_dir: impl Into<PathBuf>) -> EngineBuilder {
        EngineBuilder::new(base_dir.into())
    }

    /// Directory shared by all phases of this engine.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Registry activated modules are recorded in.
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }

    /// Register `phase` keyed by its concrete type, replacing any previous
    /// phase of the same type.
    pub fn register<P: LoaderPhase>(&mut self, phase: P) {
        self.register_as(PhaseKey::of::<P>(), Box::new(phase));
    }

    /// Register `phase` under an explicit key.
    pub fn register_as(&mut self, key: PhaseKey, phase: Box<dyn LoaderPhase>) {
        self.phases.insert(key, phase);
    }

    /// Whether a phase of type `P` is registered.
    pub fn is_registered<P: LoaderPhase>(&self) -> bool {
        self.phases.contains(&PhaseKey::of::<P>())
    }

    /// Registered phases in the order a run would execute them.
    pub fn phases(&self) -> Vec<RegisteredPhase> {
        self.phases.ordered()
    }

    /// Schedule a run on the shared loader runtime.
    ///
    /// Returns immediately; the task resolves once every phase succeeded or
    /// at the first failure.
    pub fn load_all(&self, source: Source) -> LoadTask {
        match shared_handle() {
            Ok(handle) => self.load_all_on(source, &handle),
            Err(e) => {
                self.reporter.error(&e);
                LoadTask::failed(e)
            }
        }
    }

    /// Schedule a run on `handle`.
    pub fn load_all_on(&self, source: Source, handle: &Handle) -> LoadTask {
        let run = Run {
            phases: self.phases.ordered(),
            ctx: ActivationContext::new(Arc::clone(&self.modules)),
            reporter: Arc::clone(&self.reporter),
        };
        LoadTask::spawned(handle.spawn(run.execute(source)))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("base_dir", &self.base_dir)
            .field("phases", &self.phases)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    base_dir: PathBuf,
    default_phases: bool,
    repositories: Vec<String>,
    relocator: Option<(Arc<dyn Relocator>, Vec<Relocation>)>,
    reporter: Arc<dyn Reporter>,
    modules: Arc<ModuleRegistry>,
}

impl EngineBuilder {
    fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            default_phases: true,
            repositories: Vec::new(),
            relocator: None,
            reporter: Arc::new(TracingReporter),
            modules: ModuleRegistry::global(),
        }
    }

    /// Do not register the built-in repository phase.
    pub fn without_default_phases(mut self) -> Self {
        self.default_phases = false;
        self
    }

    /// Repositories for the built-in phase (default: Maven Central).
    pub fn repositories(mut self, repositories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.repositories = repositories.into_iter().map(Into::into).collect();
        self
    }

    /// Relocate artifacts of the built-in phase with `relocator`.
    pub fn relocator(mut self, relocator: Arc<dyn Relocator>, rules: Vec<Relocation>) -> Self {
        self.relocator = Some((relocator, rules));
        self
    }

    /// Progress and error handler.
    ///
    /// The default [`TracingReporter`] emits `tracing` events; a failed run
    /// is written to stderr instead when no subscriber has been installed.
    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Registry to activate into (default: [`ModuleRegistry::global`]).
    pub fn modules(mut self, modules: Arc<ModuleRegistry>) -> Self {
        self.modules = modules;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine {
        let mut engine = Engine {
            base_dir: self.base_dir,
            phases: PhaseRegistry::new(),
            reporter: self.reporter,
            modules: self.modules,
        };

        #[cfg(feature = "network")]
        if self.default_phases {
            use crate::io::download::MAVEN_CENTRAL;
            use crate::maven::MavenPhase;

            let repositories = if self.repositories.is_empty() {
                vec![MAVEN_CENTRAL.to_string()]
            } else {
                self.repositories
            };
            let mut phase = MavenPhase::with_repositories(&engine.base_dir, repositories)
                .with_reporter(Arc::clone(&engine.reporter));
            if let Some((relocator, rules)) = self.relocator {
                phase = phase.with_relocator(relocator, rules);
            }
            engine.register(phase);
        }

        engine
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("base_dir", &self.base_dir)
            .field("default_phases", &self.default_phases)
            .field("repositories", &self.repositories)
            .finish_non_exhaustive()
    }
}

/// One scheduled execution over a registry snapshot.
struct Run {
    phases: Vec<RegisteredPhase>,
    ctx: ActivationContext,
    reporter: Arc<dyn Reporter>,
}

impl Run {
    async fn execute(self, source: Source) -> Result<(), LoadError> {
        let result = self.run_phases(&source).await;
        if let Err(e) = &result {
            self.reporter.error(e);
        }
        result
    }

    async fn run_phases(&self, source: &Source) -> Result<(), LoadError> {
        let accepted: Vec<EntityKind> = self.phases.iter().map(|p| p.kind.clone()).collect();
        source.route(&accepted)?;

        for entry in &self.phases {
            let name = entry.name;
            let fail = |step: Step| move |source: PhaseError| LoadError::Phase { phase: name, step, source };

            let mut phase = entry.phase.lock().await;
            self.reporter.phase_started(name, entry.priority);

            phase.collect(source).map_err(fail(Step::Collect))?;
            phase.materialize().await.map_err(fail(Step::Materialize))?;
            if let Some(transformable) = phase.as_transformable() {
                transformable
                    .transform()
                    .await
                    .map_err(fail(Step::Transform))?;
            }
            phase.activate(&self.ctx).await.map_err(fail(Step::Activate))?;

            self.reporter.phase_finished(name);
        }
        Ok(())
    }
}

/// Pending result of [`Engine::load_all`].
///
/// Await it from async code, or block on it once with [`LoadTask::wait`].
/// Dropping it does not cancel the run.
#[derive(Debug)]
pub struct LoadTask {
    inner: TaskState,
}

#[derive(Debug)]
enum TaskState {
    Spawned(JoinHandle<Result<(), LoadError>>),
    Failed(Option<LoadError>),
}

impl LoadTask {
    fn spawned(handle: JoinHandle<Result<(), LoadError>>) -> Self {
        Self {
            inner: TaskState::Spawned(handle),
        }
    }

    fn failed(err: LoadError) -> Self {
        Self {
            inner: TaskState::Failed(Some(err)),
        }
    }

    /// Whether the run has completed.
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            TaskState::Spawned(handle) => handle.is_finished(),
            TaskState::Failed(_) => true,
        }
    }

    /// Block the calling thread until the run completes.
    ///
    /// Meant for synchronous host startup. Do not call it from a task of a
    /// current-thread runtime that the run itself was scheduled on.
    ///
    /// # Errors
    ///
    /// Returns the run's [`LoadError`].
    pub fn wait(self) -> Result<(), LoadError> {
        futures::executor::block_on(self)
    }
}

impl Future for LoadTask {
    type Output = Result<(), LoadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            TaskState::Spawned(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.map_err(LoadError::from).and_then(|result| result)),
            TaskState::Failed(err) => Poll::Ready(Err(err.take().unwrap_or_else(|| {
                LoadError::Runtime("load task polled after completion".to_string())
            }))),
        }
    }
}
