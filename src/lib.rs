//! # procvisor
//!
//! **Procvisor** is a process-pool supervisor.
//!
//! It forks one worker process per execution unit, replaces workers that
//! crash, leaves alone workers that stop on purpose or fail fatally, and
//! terminates with a reserved exit code once no worker is left. Workers talk
//! to the supervisor over their stdio pipes.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   worker #1  │   │   worker #2  │   │   worker #N  │
//!     │ serve(svc)   │   │ serve(svc)   │   │ serve(svc)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!      stdio │ (newline JSON)   │                  │
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   monitor    │   │   monitor    │   │   monitor    │
//!     │ (per child)  │   │ (per child)  │   │ (per child)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ WorkerEvent::{Online, Exit}         │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 event channel (mpsc, single consumer)             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (control loop)                                        │
//! │  - SupervisorState (registry of live workers)                     │
//! │  - RestartPolicy   (graceful / fatal / restart)                   │
//! │  - Spawn           (how workers are created)                      │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ publish(Event)                                   │ WorkerHandle
//!        ▼                                                  ▼
//!   SubscriberSet ──► LogWriter, ...               disconnect() / kill()
//!   Bus (broadcast) ──► external receivers
//! ```
//!
//! ### Lifecycle
//! ```text
//! start() ──► spawn_worker() × pool_size           (all Starting)
//!
//! Online(id) ──► Starting → Online
//! Exit(exit) ──► remove(id)
//!                ├─ code == 0 or graceful ─► retired
//!                ├─ code == 99            ─► retired (fatal)
//!                └─ otherwise             ─► spawn_worker()  (new id)
//!                registry empty ─► exit(99)
//!
//! SIGINT/SIGTERM ──► disconnect all ──► wait grace ──► exit(0)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Own the pool, apply the restart policy, detect exhaustion.     | [`Supervisor`], [`Termination`]             |
//! | **Policies**      | Classify worker exits.                                         | [`RestartPolicy`], [`ExitDecision`]         |
//! | **Workers**       | Spawn processes, control them, report their lifecycle.         | [`Spawn`], [`ProcessSpawner`], [`WorkerHandle`] |
//! | **Worker side**   | Handshake and stop protocol inside the worker process.         | [`serve`], [`WorkerContext`], [`Service`]   |
//! | **Subscriber API**| Hook into supervisor events (logging, custom subscribers).     | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors for the runtime, spawning, services and config.   | [`RuntimeError`], [`ServiceError`]          |
//! | **Configuration** | Centralize runtime settings, load them from TOML.              | [`SupervisorConfig`]                        |
//!
//! ## Example
//! One binary plays both roles: workers are spawned with
//! [`ROLE_ENV`]`=`[`ROLE_WORKER`].
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use procvisor::{
//!     LogWriter, ROLE_ENV, ROLE_WORKER, ServeOptions, ServiceFn, ServiceRef, Supervisor,
//!     SupervisorConfig, WorkerContext,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     if std::env::var(ROLE_ENV).as_deref() == Ok(ROLE_WORKER) {
//!         let svc: ServiceRef = ServiceFn::arc("idle", |ctx: CancellationToken| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         });
//!         let code = procvisor::serve(svc, WorkerContext::from_stdio(), ServeOptions::default()).await;
//!         std::process::exit(code);
//!     }
//!
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(vec![Arc::new(LogWriter)])
//!         .build()?;
//!     let outcome = sup.run().await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod workers;

pub mod telemetry;

// ---- Public re-exports ----

pub use core::{
    Supervisor, SupervisorBuilder, SupervisorConfig, SupervisorState, Termination, WorkerRecord,
    WorkerState, wait_for_shutdown_signal,
};
pub use error::{ConfigError, RuntimeError, ServiceError, SpawnError};
pub use events::{Bus, Event, EventKind};
pub use policies::{ExitDecision, FATAL_EXIT_CODE, RestartPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use workers::{
    IpcMessage, ProcessSpawner, ROLE_ENV, ROLE_WORKER, ServeOptions, Service, ServiceFn,
    ServiceRef, Spawn, SpawnRef, WorkerCommand, WorkerContext, WorkerEvent, WorkerExit,
    WorkerHandle, WorkerId, WorkerProgram, serve,
};
