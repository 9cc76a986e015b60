//! Domain-specific errors for loader phases and the engine.
//!
//! Every step failure is surfaced as a [`PhaseError`]; the engine wraps the
//! first one it sees into [`LoadError::Phase`] and keeps it reachable through
//! `source()` and [`LoadError::cause`], so callers can tell a network failure
//! from a rewrite failure by matching on variants.

use std::path::PathBuf;

use hdl_schema::{Coordinates, EntityError, EntityKind};
use thiserror::Error;

use crate::phase::PhaseState;

/// Failure to turn an entity into local bytes.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No configured repository has the artifact.
    #[error("{coordinates} not found in {tried} repositories")]
    NotFound {
        /// Artifact that was requested.
        coordinates: Coordinates,
        /// Number of repositories consulted.
        tried: usize,
    },

    /// The resolver has nowhere to look.
    #[error("No repositories configured")]
    NoRepositories,

    /// Transport-level failure.
    #[cfg(feature = "network")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A repository answered with an unexpected status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// URL that was requested.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// Local storage failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Downloaded bytes do not match the declared digest.
    #[error("Hash mismatch for {coordinates}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Artifact that was downloaded.
        coordinates: Coordinates,
        /// Declared digest.
        expected: String,
        /// Digest of the received bytes.
        actual: String,
    },
}

/// Failure while rewriting a materialized artifact.
#[derive(Error, Debug)]
pub enum TransformError {
    /// A relocation rule is malformed.
    #[error("Invalid relocation rule: {0}")]
    InvalidRule(String),

    /// The relocator rejected an input.
    #[error("Failed to relocate {}: {message}", path.display())]
    Rewrite {
        /// Input that could not be rewritten.
        path: PathBuf,
        /// Relocator diagnostic.
        message: String,
    },

    /// The blocking relocation task did not complete.
    #[error("Relocation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Local storage failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to make an artifact visible to the running process.
#[derive(Error, Debug)]
pub enum ActivationError {
    /// The artifact to activate is not on disk.
    #[error("Artifact missing at {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Another artifact already provides this target.
    #[error("Module '{target}' is already provided by {existing}, cannot activate {incoming}")]
    Conflict {
        /// Module name.
        target: String,
        /// Artifact currently providing the module.
        existing: Coordinates,
        /// Artifact that tried to replace it.
        incoming: Coordinates,
    },

    /// The module registry lock was poisoned by a panicking writer.
    #[error("Module registry lock poisoned")]
    Poisoned,
}

/// Caller errors in what was declared or how it was routed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The same coordinates were declared twice for one phase.
    #[error("Duplicate coordinates {0}")]
    DuplicateCoordinates(Coordinates),

    /// A provider yielded an entity tagged with a different kind.
    #[error("Provider of kind '{provider}' yielded {coordinates} tagged '{found}'")]
    KindMismatch {
        /// Kind the provider declared.
        provider: EntityKind,
        /// Offending entity.
        coordinates: Coordinates,
        /// Kind the entity carried.
        found: EntityKind,
    },

    /// No registered phase accepts this kind.
    #[error("No loader phase accepts entities of kind '{0}'")]
    Unrouted(EntityKind),

    /// A declaration did not parse.
    #[error("Invalid declaration: {0}")]
    Entity(#[from] EntityError),
}

/// Everything a single phase step can fail with.
#[derive(Error, Debug)]
pub enum PhaseError {
    /// Entities could not be gathered from the source.
    #[error("Collection failed: {0}")]
    Collection(String),

    /// Declarations are invalid or misrouted.
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// An artifact could not be downloaded.
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// An artifact could not be rewritten.
    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    /// An artifact could not be activated.
    #[error("Activation failed: {0}")]
    Activation(#[from] ActivationError),

    /// A step was invoked before its predecessor completed.
    #[error("Illegal phase transition {from:?} -> {to:?}")]
    OutOfOrder {
        /// State the phase was in.
        from: PhaseState,
        /// State the call tried to reach.
        to: PhaseState,
    },

    /// Local storage failure outside a more specific step.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure raised by a third-party phase.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PhaseError {
    /// Wrap an arbitrary error from a custom phase.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

/// The engine-level step at which a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Gathering entities from the source.
    Collect,
    /// Resolving entities to local files.
    Materialize,
    /// Rewriting materialized files.
    Transform,
    /// Making files visible to the process.
    Activate,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Collect => "collect",
            Self::Materialize => "materialize",
            Self::Transform => "transform",
            Self::Activate => "activate",
        })
    }
}

/// Terminal error of a `load_all` run.
#[derive(Error, Debug)]
pub enum LoadError {
    /// A phase step failed; no later step or phase ran.
    #[error("{phase} failed to {step}: {source}")]
    Phase {
        /// Name of the failing phase.
        phase: &'static str,
        /// Step that failed.
        step: Step,
        /// Original failure.
        #[source]
        source: PhaseError,
    },

    /// The source could not be routed to the registered phases.
    #[error("Dependency routing failed: {0}")]
    Configuration(#[from] ConfigError),

    /// The run task panicked.
    #[error("Dependency loading aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),

    /// No runtime was available to schedule the run.
    #[error("Dependency loading could not be scheduled: {0}")]
    Runtime(String),
}

impl LoadError {
    /// The original phase failure, if the run stopped inside a phase.
    pub fn cause(&self) -> Option<&PhaseError> {
        match self {
            Self::Phase { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The step at which the run stopped, if it stopped inside a phase.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Phase { step, .. } => Some(*step),
            _ => None,
        }
    }
}
