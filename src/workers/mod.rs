//! Worker boundary: everything the supervisor knows about a worker.
//!
//! ## Contents
//! - [`WorkerId`], [`WorkerHandle`], [`WorkerCommand`]: identity and control
//! - [`WorkerEvent`], [`WorkerExit`]: lifecycle notifications (the event channel payload)
//! - [`Spawn`]: how workers are created; [`ProcessSpawner`] forks OS processes
//! - [`WorkerContext`], [`serve`], [`Service`]: the worker-side half of the contract
//!
//! ## Quick wiring
//! ```text
//! supervisor ── Spawn::spawn(events_tx) ──► ProcessSpawner ──► child process
//!                                                │                 │
//!                                             monitor ◄── stdio ──► WorkerContext
//!                                                │                 └─► serve(Service)
//! events_rx ◄── WorkerEvent::{Online, Exit} ─────┘
//! ```

mod context;
mod handle;
mod ipc;
mod process;
mod service;
mod spawn;

pub use context::{ServeOptions, WorkerContext, serve};
pub use handle::{WorkerCommand, WorkerEvent, WorkerExit, WorkerHandle, WorkerId};
pub use ipc::IpcMessage;
pub use process::{ProcessSpawner, ROLE_ENV, ROLE_WORKER, WorkerProgram};
pub use service::{Service, ServiceFn, ServiceRef};
pub use spawn::{Spawn, SpawnRef};
