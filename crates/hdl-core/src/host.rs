//! Gating a host application's lifecycle on dependency loading.
//!
//! The host's own startup work must not run unless every phase succeeded,
//! since its code links against the activated modules.

use crate::engine::Engine;
use crate::error::LoadError;
use crate::source::Source;

/// Lifecycle callbacks of a host application.
pub trait HostLifecycle {
    /// Called once dependencies are in place.
    fn load(&mut self) {}

    /// Called when the host is enabled.
    fn enable(&mut self) {}

    /// Called when the host is disabled.
    fn disable(&mut self) {}
}

/// Wraps a host so its callbacks run only after a successful load.
#[derive(Debug)]
pub struct GatedHost<H> {
    engine: Engine,
    source: Source,
    host: H,
    outcome: Option<Result<(), LoadError>>,
}

impl<H: HostLifecycle> GatedHost<H> {
    /// Gate `host` on loading `source` with `engine`.
    pub fn new(engine: Engine, source: Source, host: H) -> Self {
        Self {
            engine,
            source,
            host,
            outcome: None,
        }
    }

    /// Load dependencies, blocking until done, then forward to the host's
    /// `load` on success.
    ///
    /// Runs the engine at most once; later calls return the recorded
    /// outcome. Returns whether the host is ready.
    pub fn on_load(&mut self) -> bool {
        if self.outcome.is_none() {
            let result = self.engine.load_all(self.source.clone()).wait();
            match &result {
                Ok(()) => tracing::info!("dependencies loaded"),
                Err(e) => tracing::error!(error = %e, "dependencies failed to load; host stays disabled"),
            }
            let ready = result.is_ok();
            self.outcome = Some(result);
            if ready {
                self.host.load();
            }
        }
        self.is_ready()
    }

    /// Forward `enable` if loading succeeded.
    pub fn on_enable(&mut self) -> bool {
        let ready = self.is_ready();
        if ready {
            self.host.enable();
        }
        ready
    }

    /// Forward `disable` if loading succeeded.
    pub fn on_disable(&mut self) -> bool {
        let ready = self.is_ready();
        if ready {
            self.host.disable();
        }
        ready
    }

    /// Whether a load ran and succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome, Some(Ok(())))
    }

    /// The recorded load failure, if any.
    pub fn failure(&self) -> Option<&LoadError> {
        self.outcome.as_ref().and_then(|r| r.as_ref().err())
    }

    /// The wrapped host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The engine driving the load.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
