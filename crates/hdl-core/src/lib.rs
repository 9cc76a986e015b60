//! Runtime dependency loading.
//!
//! An [`Engine`] holds one [`LoaderPhase`] per phase type and, for a given
//! [`Source`], runs each phase in ascending priority through
//! collect → materialize → transform (if supported) → activate. The first
//! failure stops the run and is reported as a [`LoadError`] naming the phase
//! and step.
//!
//! ```no_run
//! use hdl_core::{Engine, Source};
//! use hdl_core::source::DeclaresDependencies;
//! use hdl_schema::Declaration;
//!
//! struct MyPlugin;
//!
//! impl DeclaresDependencies for MyPlugin {
//!     const DEPENDENCIES: &'static [Declaration] = &[
//!         Declaration::maven("com.google.code.gson:gson:2.10.1", "com.google.gson"),
//!     ];
//! }
//!
//! let engine = Engine::new("/tmp/hdl");
//! engine.load_all(Source::of::<MyPlugin>()).wait()?;
//! # Ok::<(), hdl_core::LoadError>(())
//! ```

pub mod engine;
pub mod error;
pub mod host;
pub mod io;
pub mod manifest;
pub mod maven;
pub mod modules;
pub mod paths;
pub mod phase;
pub mod registry;
pub mod relocation;
pub mod reporter;
pub mod source;
pub mod store;

pub use engine::{Engine, EngineBuilder, LoadTask};
pub use error::{
    ActivationError, ConfigError, LoadError, PhaseError, ResolveError, Step, TransformError,
};
pub use host::{GatedHost, HostLifecycle};
pub use manifest::{EngineConfig, Manifest};
pub use maven::MavenPhase;
pub use modules::{ActivationContext, LoadedModule, ModuleRegistry};
pub use phase::{LoaderPhase, PhaseKey, PhaseState, TransformablePhase};
pub use relocation::{Relocation, Relocator};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use source::{DeclaresDependencies, DependencyProvider, Source, StaticProvider};
pub use store::ArtifactStore;

/// User agent sent with repository requests.
pub const USER_AGENT: &str = concat!("hdl-core/", env!("CARGO_PKG_VERSION"));
