//! # Worker identity, control handle and lifecycle events.
//!
//! These types are the whole contract between the supervisor and a worker:
//! the supervisor holds a [`WorkerHandle`] to send [`WorkerCommand`]s, and
//! receives [`WorkerEvent`]s on the event channel.
//!
//! ```text
//! Supervisor ── WorkerHandle.disconnect()/kill() ──► monitor ──► worker process
//! Supervisor ◄── WorkerEvent::Online / Exit ──────── monitor ◄── stdout / wait()
//! ```
//!
//! ## Rules
//! - A worker's `Online` is always delivered before its `Exit`.
//! - Exactly one `Exit` is delivered per worker.
//! - Commands to a worker that is already gone are silently dropped.

use std::fmt;

use tokio::sync::mpsc;

/// Operating-system process identifier of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instruction sent from the supervisor to a worker's monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Cooperative shutdown: handshake first, the resulting exit is graceful.
    Disconnect,
    /// Forceful termination: no handshake, the resulting exit is a crash.
    Kill,
}

/// Supervisor-side handle to a running worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    commands: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    /// Creates a handle from a worker id and its command channel.
    pub fn new(id: WorkerId, commands: mpsc::Sender<WorkerCommand>) -> Self {
        Self { id, commands }
    }

    /// Worker id (pid).
    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Requests an orderly disconnect.
    ///
    /// Returns `false` if the worker's monitor is already gone.
    pub fn disconnect(&self) -> bool {
        self.commands.try_send(WorkerCommand::Disconnect).is_ok()
    }

    /// Requests a forceful kill.
    ///
    /// Returns `false` if the worker's monitor is already gone.
    pub fn kill(&self) -> bool {
        self.commands.try_send(WorkerCommand::Kill).is_ok()
    }
}

/// How a worker process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    /// Worker that exited.
    pub id: WorkerId,
    /// Exit code; `128 + signo` when the process was killed by a signal.
    pub code: i32,
    /// Name of the terminating signal (`"SIGKILL"`), if any.
    pub signal: Option<String>,
    /// True when an orderly disconnect preceded the exit.
    pub graceful: bool,
}

impl WorkerExit {
    /// Exit with a plain code, no signal, no disconnect.
    pub fn code(id: WorkerId, code: i32) -> Self {
        Self {
            id,
            code,
            signal: None,
            graceful: false,
        }
    }

    /// Exit caused by a signal.
    pub fn signaled(id: WorkerId, signo: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            code: 128 + signo,
            signal: Some(name.into()),
            graceful: false,
        }
    }

    /// Marks the exit as preceded by a graceful disconnect.
    #[must_use]
    pub fn after_disconnect(mut self) -> Self {
        self.graceful = true;
        self
    }
}

/// Lifecycle notification delivered on the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The worker finished initialising its service.
    Online(WorkerId),
    /// The worker process is gone.
    Exit(WorkerExit),
}

impl WorkerEvent {
    /// Worker the event is about.
    pub fn id(&self) -> WorkerId {
        match self {
            WorkerEvent::Online(id) => *id,
            WorkerEvent::Exit(exit) => exit.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaled_exit_uses_shell_convention() {
        let exit = WorkerExit::signaled(WorkerId(7), 9, "SIGKILL");
        assert_eq!(exit.code, 137);
        assert_eq!(exit.signal.as_deref(), Some("SIGKILL"));
        assert!(!exit.graceful);
    }

    #[tokio::test]
    async fn commands_to_dropped_monitor_are_ignored() {
        let (tx, rx) = mpsc::channel(1);
        let handle = WorkerHandle::new(WorkerId(1), tx);
        drop(rx);
        assert!(!handle.disconnect());
        assert!(!handle.kill());
    }
}
