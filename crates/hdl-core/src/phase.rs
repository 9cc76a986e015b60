//! The loader phase contract.
//!
//! A phase handles one kind of entity end to end:
//!
//! ```text
//! Idle --collect--> Collected --materialize--> Materialized --[transform]--> Transformed
//!                                                   |                             |
//!                                                   +----------activate-----------+--> Activated
//! ```
//!
//! Any step may instead move the phase to `Failed`. The engine drives the
//! transitions; [`PhaseState::advance`] lets implementations reject calls
//! that arrive out of order.

use std::any::TypeId;

use async_trait::async_trait;
use hdl_schema::EntityKind;

use crate::error::PhaseError;
use crate::modules::ActivationContext;
use crate::source::Source;

/// One pluggable dependency-handling stage.
///
/// Implementations keep per-invocation state (staged and materialized
/// entities) internally; the engine owns the instance and calls the steps
/// in order, at most once each per `load_all`.
#[async_trait]
pub trait LoaderPhase: Send + 'static {
    /// Human readable name used in logs and errors.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Ordering key; lower runs first. Must be a constant of the type: the
    /// engine reads it once at registration.
    fn priority(&self) -> i32;

    /// Entity kind this phase consumes from a [`Source`].
    fn kind(&self) -> EntityKind;

    /// Stage the entities of [`Self::kind`] found in `source`.
    ///
    /// Calling this again replaces the previous collection.
    fn collect(&mut self, source: &Source) -> Result<(), PhaseError>;

    /// Resolve every staged entity to local storage. The first failing
    /// entity aborts the phase.
    async fn materialize(&mut self) -> Result<(), PhaseError>;

    /// Capability test for the optional transform step.
    fn as_transformable(&mut self) -> Option<&mut dyn TransformablePhase> {
        None
    }

    /// Make materialized (and possibly transformed) entities available to
    /// the running process.
    async fn activate(&mut self, ctx: &ActivationContext) -> Result<(), PhaseError>;
}

/// Optional capability of a phase: rewrite materialized artifacts before
/// activation.
#[async_trait]
pub trait TransformablePhase: Send {
    /// Rewrite every materialized artifact. Must be safe to re-run on
    /// already rewritten output.
    async fn transform(&mut self) -> Result<(), PhaseError>;
}

/// Per-invocation lifecycle of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseState {
    /// Nothing collected yet.
    #[default]
    Idle,
    /// Entities are staged.
    Collected,
    /// Staged entities are on local storage.
    Materialized,
    /// Materialized entities were rewritten.
    Transformed,
    /// Entities are visible to the process.
    Activated,
    /// A step failed; only a new collection may follow.
    Failed,
}

impl PhaseState {
    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// A new collection may start from any state, including one left
    /// behind by a run that was dropped midway; the last collection wins.
    pub fn can_advance(self, to: Self) -> bool {
        use PhaseState::{Activated, Collected, Failed, Materialized, Transformed};

        matches!(
            (self, to),
            (_, Failed | Collected)
                | (Collected, Materialized)
                | (Materialized, Transformed)
                | (Materialized | Transformed, Activated)
        )
    }

    /// Move to `to`, or report the illegal transition.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::OutOfOrder`] when the transition is not allowed;
    /// the state is left unchanged.
    pub fn advance(&mut self, to: Self) -> Result<(), PhaseError> {
        if !self.can_advance(to) {
            return Err(PhaseError::OutOfOrder { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

/// Registry key identifying a phase by its concrete type.
///
/// Two keys are equal when they were made from the same type, so at most
/// one instance per phase type can be registered.
#[derive(Debug, Clone, Copy)]
pub struct PhaseKey {
    id: TypeId,
    name: &'static str,
}

impl PhaseKey {
    /// Key for phase type `P`.
    pub fn of<P: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<P>(),
            name: std::any::type_name::<P>(),
        }
    }

    /// Full type name the key was made from.
    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PhaseKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PhaseKey {}

impl std::hash::Hash for PhaseKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
