//! # Worker launcher abstraction.
//!
//! [`Spawn`] is the seam between the supervisor and the way workers are
//! created. The production implementation is
//! [`ProcessSpawner`](crate::workers::ProcessSpawner); tests plug in scripted
//! spawners that never touch the OS.
//!
//! ## Contract
//! - `spawn` returns only after the worker exists and has an id.
//! - The implementation must eventually deliver exactly one
//!   [`WorkerEvent::Exit`](crate::workers::WorkerEvent) on `events` for every
//!   handle it returned, preceded by at most one `Online`.
//! - Failing to create the worker is reported as [`SpawnError`], never by
//!   returning a handle to a dead worker.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SpawnError;
use crate::workers::{WorkerEvent, WorkerHandle};

/// Creates worker processes on behalf of the supervisor.
#[async_trait]
pub trait Spawn: Send + Sync + 'static {
    /// Launches one worker that reports its lifecycle on `events`.
    async fn spawn(&self, events: mpsc::Sender<WorkerEvent>) -> Result<WorkerHandle, SpawnError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared reference to a spawner.
pub type SpawnRef = Arc<dyn Spawn>;
