//! # Supervisor: owns the worker pool, the restart policy and its own exit.
//!
//! The [`Supervisor`] spawns one worker per execution unit, then consumes
//! worker lifecycle notifications one at a time from a single event channel.
//! Every exit is run through the [`RestartPolicy`]; when the registry empties
//! the supervisor terminates with the fatal sentinel code.
//!
//! ## High-level architecture
//! ```text
//! run_until(shutdown):
//!   start()  ──► spawn_worker() × pool_size
//!
//!   loop (single control task, no reentrancy) {
//!     events_rx.recv():
//!       Online(id) ──► on_online(id)      Starting → Online
//!       Exit(exit) ──► on_exit(exit)
//!                        ├─ remove record
//!                        ├─ policy.decide(&exit)
//!                        │    ├─ Graceful → retire
//!                        │    ├─ Fatal    → retire
//!                        │    └─ Restart  → spawn_worker()   (errors propagate)
//!                        └─ registry empty → Termination::Exhausted { code: 99 }
//!     shutdown:
//!       ShutdownRequested → disconnect all → drain exits (no restarts) within grace
//!         ├─ all gone   → AllStoppedWithin → Termination::Shutdown
//!         └─ timed out  → GraceExceeded    → kill rest → RuntimeError::GraceExceeded
//!   }
//! ```
//!
//! ## Rules
//! - The registry is mutated only here, through `&mut self`.
//! - Exits are processed independently, in delivery order; no batching.
//! - An exit for an unknown id is ignored: no restart, no escalation.
//! - A failed spawn is never swallowed: the pool must not silently shrink.
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{LogWriter, Supervisor, SupervisorConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(vec![Arc::new(LogWriter)])
//!         .build()?;
//!
//!     let outcome = sup.run().await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::registry::SupervisorState;
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{ExitDecision, RestartPolicy};
use crate::subscribers::SubscriberSet;
use crate::workers::{SpawnRef, WorkerEvent, WorkerExit, WorkerId};

/// How long to wait for exit events after force-killing workers.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Why the supervisor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every worker reached a terminal, non-restartable state.
    Exhausted {
        /// Exit code the supervisor process must use (the fatal sentinel).
        code: i32,
    },
    /// A shutdown signal was handled and every worker exited in time.
    Shutdown,
}

impl Termination {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::Exhausted { code } => *code,
            Termination::Shutdown => 0,
        }
    }
}

/// Owns the worker pool and applies the restart policy.
pub struct Supervisor {
    cfg: SupervisorConfig,
    policy: RestartPolicy,
    spawner: SpawnRef,
    state: SupervisorState,
    bus: Bus,
    subs: Option<SubscriberSet>,
    events_tx: mpsc::Sender<WorkerEvent>,
    events_rx: mpsc::Receiver<WorkerEvent>,
    started: bool,
    shutting_down: bool,
    born: Instant,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        spawner: SpawnRef,
        bus: Bus,
        subs: SubscriberSet,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(cfg.event_capacity_clamped());
        Self {
            policy: cfg.restart_policy(),
            cfg,
            spawner,
            state: SupervisorState::new(),
            bus,
            subs: Some(subs),
            events_tx,
            events_rx,
            started: false,
            shutting_down: false,
            born: Instant::now(),
        }
    }

    /// Current registry (read-only).
    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Receives every event the supervisor publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Sender half of the worker event channel.
    ///
    /// Spawners receive a clone on every spawn; exposing it lets embedders
    /// and tests inject lifecycle notifications.
    pub fn events(&self) -> mpsc::Sender<WorkerEvent> {
        self.events_tx.clone()
    }

    /// Spawns the initial pool: one worker per execution unit, or
    /// `config.workers` when set.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` on a second call; `Spawn` if any worker cannot be created.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.started = true;

        let size = self.cfg.pool_size();
        info!(
            pid = std::process::id(),
            pool_size = size,
            spawner = self.spawner.name(),
            "starting worker pool"
        );
        for _ in 0..size {
            self.spawn_worker().await?;
        }
        Ok(())
    }

    /// Creates one worker and registers it as `Starting`.
    ///
    /// # Errors
    ///
    /// `Spawn` if the process cannot be created, `DuplicateWorker` if the
    /// spawner hands out an id that is still registered.
    pub async fn spawn_worker(&mut self) -> Result<WorkerId, RuntimeError> {
        info!(spawner = self.spawner.name(), "forking worker");
        let handle = self.spawner.spawn(self.events_tx.clone()).await?;
        let id = handle.id();

        let before = self.state.len();
        if !self.state.insert(handle) {
            return Err(RuntimeError::DuplicateWorker(id));
        }

        self.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_worker(id)
                .with_pool(before, self.state.len()),
        );
        self.log_pool();
        Ok(id)
    }

    /// Handles a worker's readiness notification.
    ///
    /// Unknown ids and repeated notifications are ignored.
    pub fn on_online(&mut self, id: WorkerId) {
        if self.state.mark_online(id) {
            self.publish(Event::new(EventKind::WorkerOnline).with_worker(id));
        } else {
            debug!(worker = %id, "online notification ignored");
        }
    }

    /// Handles a worker exit: removes the record, applies the restart policy
    /// and detects pool exhaustion.
    ///
    /// Returns `Some(Termination::Exhausted { .. })` when the supervisor must
    /// terminate. During shutdown exits only remove records.
    ///
    /// # Errors
    ///
    /// Propagates a failure to spawn the replacement worker.
    pub async fn on_exit(&mut self, exit: WorkerExit) -> Result<Option<Termination>, RuntimeError> {
        let before = self.state.len();
        if self.state.remove(exit.id).is_none() {
            warn!(worker = %exit.id, code = exit.code, "exit for unknown worker ignored");
            return Ok(None);
        }

        self.publish(
            Event::new(EventKind::WorkerExited)
                .with_exit(&exit)
                .with_pool(before, self.state.len())
                .with_uptime(self.born.elapsed()),
        );

        if self.shutting_down {
            return Ok(None);
        }

        match self.policy.decide(&exit) {
            ExitDecision::Graceful => {
                self.publish(
                    Event::new(EventKind::WorkerRetired)
                        .with_worker(exit.id)
                        .with_code(exit.code),
                );
            }
            ExitDecision::Fatal => {
                self.publish(
                    Event::new(EventKind::WorkerFatal)
                        .with_worker(exit.id)
                        .with_code(exit.code),
                );
            }
            ExitDecision::Restart => {
                let mut ev = Event::new(EventKind::WorkerRestarting)
                    .with_worker(exit.id)
                    .with_code(exit.code);
                if let Some(sig) = exit.signal.as_deref() {
                    ev = ev.with_signal(sig);
                }
                self.publish(ev);
                self.spawn_worker().await?;
                return Ok(None);
            }
        }

        self.log_pool();
        if self.state.is_empty() {
            let code = self.policy.fatal_code;
            self.publish(Event::new(EventKind::PoolExhausted).with_code(code));
            return Ok(Some(Termination::Exhausted { code }));
        }
        Ok(None)
    }

    /// Asks a worker to shut down cooperatively; its exit will be graceful.
    ///
    /// Returns `false` if the worker is unknown or already gone.
    pub fn disconnect(&self, id: WorkerId) -> bool {
        self.state
            .get(id)
            .map(|rec| rec.handle().disconnect())
            .unwrap_or(false)
    }

    /// Kills a worker without handshake; its exit counts as a crash.
    ///
    /// Returns `false` if the worker is unknown or already gone.
    pub fn kill(&self, id: WorkerId) -> bool {
        self.state
            .get(id)
            .map(|rec| rec.handle().kill())
            .unwrap_or(false)
    }

    /// Runs until the pool is exhausted or an OS termination signal arrives.
    pub async fn run(self) -> Result<Termination, RuntimeError> {
        self.run_until(shutdown::wait_for_shutdown_signal()).await
    }

    /// Runs until the pool is exhausted or `shutdown` completes.
    ///
    /// On error, remaining workers are killed before returning.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<Termination, RuntimeError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let res = self.drive(shutdown).await;
        if res.is_err() && !self.state.is_empty() {
            self.shutting_down = true;
            self.kill_all();
            self.drain_exits(KILL_WAIT).await;
        }
        if let Some(subs) = self.subs.take() {
            subs.shutdown().await;
        }
        res
    }

    async fn drive<F>(&mut self, shutdown: F) -> Result<Termination, RuntimeError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        self.start().await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                ev = self.events_rx.recv() => match ev {
                    Some(WorkerEvent::Online(id)) => self.on_online(id),
                    Some(WorkerEvent::Exit(exit)) => {
                        if let Some(done) = self.on_exit(exit).await? {
                            return Ok(done);
                        }
                    }
                    None => {
                        return Err(RuntimeError::ChannelClosed { live: self.state.len() });
                    }
                },
                res = &mut shutdown => {
                    res.map_err(RuntimeError::Signal)?;
                    return self.shutdown_pool().await;
                }
            }
        }
    }

    /// Disconnects every worker and waits for them within the grace period.
    async fn shutdown_pool(&mut self) -> Result<Termination, RuntimeError> {
        self.shutting_down = true;
        self.publish(
            Event::new(EventKind::ShutdownRequested).with_pool(self.state.len(), 0),
        );
        for rec in self.state.iter() {
            rec.handle().disconnect();
        }

        let grace = self.cfg.grace;
        if self.drain_exits(grace).await {
            self.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(Termination::Shutdown);
        }

        let stuck = self.state.ids();
        self.publish(
            Event::new(EventKind::GraceExceeded).with_pool(stuck.len(), 0),
        );
        self.kill_all();
        self.drain_exits(KILL_WAIT).await;
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    /// Consumes lifecycle events until the registry is empty or `limit` elapses.
    ///
    /// Returns `true` if every worker exited.
    async fn drain_exits(&mut self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while !self.state.is_empty() {
            match tokio::time::timeout_at(deadline, self.events_rx.recv()).await {
                Ok(Some(WorkerEvent::Online(id))) => self.on_online(id),
                Ok(Some(WorkerEvent::Exit(exit))) => {
                    // Restarts are disabled while shutting down, so this cannot fail.
                    let _ = self.on_exit(exit).await;
                }
                Ok(None) | Err(_) => return false,
            }
        }
        true
    }

    fn kill_all(&self) {
        for rec in self.state.iter() {
            rec.handle().kill();
        }
    }

    fn publish(&self, ev: Event) {
        if let Some(subs) = &self.subs {
            subs.emit(&ev);
        }
        self.bus.publish(ev);
    }

    fn log_pool(&self) {
        let ids: Vec<String> = self.state.ids().iter().map(ToString::to_string).collect();
        info!(
            pool = self.state.len(),
            workers = %ids.join(", "),
            "worker pool updated"
        );
    }
}
