//! Runtime core: the supervisor and what it owns.
//!
//! The only types most users need from this module are [`Supervisor`],
//! [`SupervisorBuilder`] and [`SupervisorConfig`].
//!
//! Internal modules:
//! - [`supervisor`]: control loop, restart decisions, pool exhaustion, shutdown;
//! - [`registry`]: the worker registry (`SupervisorState`);
//! - [`builder`]: wiring of spawner, bus and subscribers;
//! - [`config`]: settings and TOML loading;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod registry;
mod shutdown;
mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use registry::{SupervisorState, WorkerRecord, WorkerState};
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{Supervisor, Termination};
