//! Reporter trait for dependency injection
//!
//! Lets the engine and its phases report progress and failures without
//! being coupled to a particular logging or UI layer. The engine's error
//! hook is the only place a failed run is surfaced besides the returned
//! future; nothing is printed from inside the core otherwise.

use std::io::{self, Write};

use hdl_schema::ProviderEntity;

use crate::error::LoadError;

pub trait Reporter: Send + Sync {
    /// A phase is about to run.
    fn phase_started(&self, name: &str, priority: i32);

    /// A phase completed every step.
    fn phase_finished(&self, name: &str);

    /// An artifact was found in the local store and not downloaded.
    fn cached(&self, entity: &ProviderEntity);

    /// An artifact was downloaded.
    fn downloaded(&self, entity: &ProviderEntity, bytes: u64);

    /// An artifact was rewritten under a private namespace.
    fn relocated(&self, entity: &ProviderEntity);

    /// An artifact was made available to the process.
    fn activated(&self, entity: &ProviderEntity);

    /// A run failed. Called once, before the run's future resolves.
    fn error(&self, err: &LoadError);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn phase_started(&self, name: &str, priority: i32) {
        (**self).phase_started(name, priority);
    }
    fn phase_finished(&self, name: &str) {
        (**self).phase_finished(name);
    }
    fn cached(&self, entity: &ProviderEntity) {
        (**self).cached(entity);
    }
    fn downloaded(&self, entity: &ProviderEntity, bytes: u64) {
        (**self).downloaded(entity, bytes);
    }
    fn relocated(&self, entity: &ProviderEntity) {
        (**self).relocated(entity);
    }
    fn activated(&self, entity: &ProviderEntity) {
        (**self).activated(entity);
    }
    fn error(&self, err: &LoadError) {
        (**self).error(err);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn phase_started(&self, _: &str, _: i32) {}
    fn phase_finished(&self, _: &str) {}
    fn cached(&self, _: &ProviderEntity) {}
    fn downloaded(&self, _: &ProviderEntity, _: u64) {}
    fn relocated(&self, _: &ProviderEntity) {}
    fn activated(&self, _: &ProviderEntity) {}
    fn error(&self, _: &LoadError) {}
}

/// Default reporter: emits `tracing` events.
///
/// Until a subscriber is installed those events go nowhere, so a failed run
/// is then written to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn phase_started(&self, name: &str, priority: i32) {
        tracing::info!(phase = name, priority, "running loader phase");
    }

    fn phase_finished(&self, name: &str) {
        tracing::debug!(phase = name, "loader phase complete");
    }

    fn cached(&self, entity: &ProviderEntity) {
        tracing::debug!(coordinates = %entity.coordinates, "using cached artifact");
    }

    fn downloaded(&self, entity: &ProviderEntity, bytes: u64) {
        tracing::info!(coordinates = %entity.coordinates, bytes, "downloaded");
    }

    fn relocated(&self, entity: &ProviderEntity) {
        tracing::debug!(coordinates = %entity.coordinates, "relocated");
    }

    fn activated(&self, entity: &ProviderEntity) {
        tracing::debug!(coordinates = %entity.coordinates, module = %entity.target, "activated");
    }

    fn error(&self, err: &LoadError) {
        if tracing::dispatcher::has_been_set() {
            tracing::error!(error = %err, "An error occurred while loading dependencies");
        } else {
            write_error(&mut std::io::stderr().lock(), err).ok();
        }
    }
}

fn write_error(out: &mut impl Write, err: &LoadError) -> io::Result<()> {
    writeln!(out, "An error occurred while loading dependencies: {err}")
}
