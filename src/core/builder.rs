use std::sync::Arc;

use crate::{
    core::SupervisorConfig,
    error::{RuntimeError, SpawnError},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    workers::{ProcessSpawner, SpawnRef, WorkerProgram},
};
use super::supervisor::Supervisor;

/// Builder for constructing a Supervisor with optional features.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    spawner: Option<SpawnRef>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            spawner: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive supervisor events (spawns, exits, restarts, ...)
    /// through dedicated tasks with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the way workers are created.
    ///
    /// Defaults to a [`ProcessSpawner`] running `config.worker`, or the
    /// current executable when no worker program is configured.
    pub fn with_spawner(mut self, spawner: SpawnRef) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Must be called from within a tokio runtime (subscriber tasks are spawned here).
    ///
    /// # Errors
    ///
    /// `Spawn` if no spawner was given and the current executable cannot be resolved.
    pub fn build(self) -> Result<Supervisor, RuntimeError> {
        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => {
                let program = match self.cfg.worker.clone() {
                    Some(program) => program,
                    None => WorkerProgram::current_exe().map_err(|source| SpawnError::Io {
                        program: "<current executable>".into(),
                        source,
                    })?,
                };
                Arc::new(ProcessSpawner::new(program))
            }
        };

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Ok(Supervisor::new_internal(self.cfg, spawner, bus, subs))
    }
}
