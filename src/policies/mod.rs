//! Restart policy.
//!
//! ## Contents
//! - [`RestartPolicy`] classifies a worker exit (graceful / fatal / restart)
//! - [`ExitDecision`]  the classification result
//! - [`FATAL_EXIT_CODE`] the reserved sentinel (99)
//!
//! ## Quick wiring
//! ```text
//! WorkerEvent::Exit(exit)
//!      └─► core::Supervisor::on_exit uses:
//!           - policy.decide(&exit) to retire or replace the worker
//!           - policy.fatal_code as its own exit code on pool exhaustion
//! ```

mod restart;

pub use restart::{ExitDecision, FATAL_EXIT_CODE, RestartPolicy};
