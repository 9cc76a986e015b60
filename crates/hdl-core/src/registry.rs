//! Insertion-ordered store of registered loader phases.

use std::sync::Arc;

use hdl_schema::EntityKind;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::phase::{LoaderPhase, PhaseKey};

/// A phase instance shared between the registry and in-flight runs.
pub type SharedPhase = Arc<Mutex<Box<dyn LoaderPhase>>>;

/// A registered phase with the metadata read at registration time.
#[derive(Clone)]
pub struct RegisteredPhase {
    /// Registry key.
    pub key: PhaseKey,
    /// Phase name.
    pub name: &'static str,
    /// Ordering key.
    pub priority: i32,
    /// Entity kind the phase consumes.
    pub kind: EntityKind,
    /// The instance.
    pub phase: SharedPhase,
}

impl std::fmt::Debug for RegisteredPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPhase")
            .field("key", &self.key.type_name())
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// At most one phase per key, remembered in registration order.
#[derive(Debug, Default)]
pub struct PhaseRegistry {
    entries: IndexMap<PhaseKey, RegisteredPhase>,
}

impl PhaseRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `phase` under `key`, replacing any previous instance.
    ///
    /// A replacement counts as a new registration: it moves to the end of the
    /// registration order. Returns the replaced entry.
    pub fn insert(&mut self, key: PhaseKey, phase: Box<dyn LoaderPhase>) -> Option<RegisteredPhase> {
        let entry = RegisteredPhase {
            key,
            name: phase.name(),
            priority: phase.priority(),
            kind: phase.kind(),
            phase: Arc::new(Mutex::new(phase)),
        };
        let previous = self.entries.shift_remove(&key);
        if let Some(old) = &previous {
            tracing::debug!(phase = entry.name, replaced = old.name, "replacing loader phase");
        }
        self.entries.insert(key, entry);
        previous
    }

    /// Whether a phase is registered under `key`.
    pub fn contains(&self, key: &PhaseKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered phases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no phase is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the registered phases in run order: ascending priority,
    /// registration order among equals.
    pub fn ordered(&self) -> Vec<RegisteredPhase> {
        let mut phases: Vec<RegisteredPhase> = self.entries.values().cloned().collect();
        // Stable sort keeps registration order for equal priorities.
        phases.sort_by_key(|p| p.priority);
        phases
    }
}
