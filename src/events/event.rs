//! # Runtime events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Pool events**: worker lifecycle as seen by the supervisor (spawned, online, exited, ...)
//! - **Shutdown events**: supervisor-initiated drain of the whole pool
//! - **Subscriber events**: health of the observability fan-out itself
//!
//! The [`Event`] struct carries metadata such as timestamps, worker id, exit
//! code and signal, and the pool size before and after the transition.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, WorkerId};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_worker(WorkerId(4242))
//!     .with_code(137)
//!     .with_signal("SIGKILL")
//!     .with_pool(4, 3);
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.worker, Some(WorkerId(4242)));
//! assert_eq!(ev.pool_after, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::workers::{WorkerExit, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and cause ("full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed); every worker is being disconnected.
    ///
    /// Sets:
    /// - `pool_before`: workers registered when the signal arrived
    ShutdownRequested,

    /// All workers exited within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; remaining workers were killed.
    ///
    /// Sets:
    /// - `pool_before`: workers still registered
    GraceExceeded,

    // === Pool events ===
    /// A worker process was created and registered as `Starting`.
    ///
    /// Sets:
    /// - `worker`, `pool_before`, `pool_after`
    WorkerSpawned,

    /// A worker reported readiness (`Starting → Online`).
    ///
    /// Sets:
    /// - `worker`
    WorkerOnline,

    /// A worker process exited and was removed from the registry.
    ///
    /// Sets:
    /// - `worker`, `code`, `signal`, `graceful`, `pool_before`, `pool_after`, `uptime`
    WorkerExited,

    /// A crashed worker is being replaced.
    ///
    /// Sets:
    /// - `worker` (the exited one), `code`, `signal`
    WorkerRestarting,

    /// A worker exited intentionally and will not be replaced.
    ///
    /// Sets:
    /// - `worker`, `code`
    WorkerRetired,

    /// A worker exited with the fatal sentinel and will not be replaced.
    ///
    /// Sets:
    /// - `worker`, `code`
    WorkerFatal,

    /// The registry became empty: no worker is left to restart.
    ///
    /// Sets:
    /// - `code`: the supervisor's own exit code
    PoolExhausted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker the event is about, if applicable.
    pub worker: Option<WorkerId>,
    /// Exit code (worker's, or the supervisor's for `PoolExhausted`).
    pub code: Option<i32>,
    /// Terminating signal name.
    pub signal: Option<Arc<str>>,
    /// Whether the exit followed a graceful disconnect.
    pub graceful: Option<bool>,
    /// Registry size before the transition.
    pub pool_before: Option<usize>,
    /// Registry size after the transition.
    pub pool_after: Option<usize>,
    /// Supervisor uptime when the event was produced.
    pub uptime: Option<Duration>,
    /// Human-readable reason (panic info, overflow details, ...).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            code: None,
            signal: None,
            graceful: None,
            pool_before: None,
            pool_after: None,
            uptime: None,
            reason: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches a signal name.
    #[inline]
    pub fn with_signal(mut self, signal: impl Into<Arc<str>>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Attaches pool size before/after the transition.
    #[inline]
    pub fn with_pool(mut self, before: usize, after: usize) -> Self {
        self.pool_before = Some(before);
        self.pool_after = Some(after);
        self
    }

    /// Attaches the supervisor uptime.
    #[inline]
    pub fn with_uptime(mut self, uptime: Duration) -> Self {
        self.uptime = Some(uptime);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Copies id, code, signal and graceful flag from a worker exit.
    pub fn with_exit(mut self, exit: &WorkerExit) -> Self {
        self.worker = Some(exit.id);
        self.code = Some(exit.code);
        self.signal = exit.signal.as_deref().map(Arc::from);
        self.graceful = Some(exit.graceful);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::WorkerOnline);
        let b = Event::new(EventKind::WorkerOnline);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn exit_fields_are_copied() {
        let exit = WorkerExit::signaled(WorkerId(9), 9, "SIGKILL");
        let ev = Event::new(EventKind::WorkerExited).with_exit(&exit);
        assert_eq!(ev.worker, Some(WorkerId(9)));
        assert_eq!(ev.code, Some(137));
        assert_eq!(ev.signal.as_deref(), Some("SIGKILL"));
        assert_eq!(ev.graceful, Some(false));
    }
}
