//! # Worker registry - the supervisor's authoritative view of the pool.
//!
//! [`SupervisorState`] holds one [`WorkerRecord`] per live worker process,
//! keyed by [`WorkerId`] and kept in spawn order.
//!
//! ## Lifecycle of a record
//! ```text
//! spawn_worker()  → insert(Starting)
//! Online(id)      → mark_online: Starting → Online
//! Exit(id)        → remove: record leaves the registry as Exited
//! ```
//!
//! ## Rules
//! - Ids are unique: inserting an id that is already present is rejected.
//! - A record is removed only when its exit event is delivered, never before.
//! - `Exited` is terminal: a removed id never comes back through `mark_online`.
//! - Only the supervisor control loop holds `&mut SupervisorState`; no locks.

use indexmap::IndexMap;

use crate::workers::{WorkerHandle, WorkerId};

/// Per-worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process created, service not ready yet.
    Starting,
    /// Worker reported readiness.
    Online,
    /// Process is gone (only observed on records returned by [`SupervisorState::remove`]).
    Exited,
}

/// One live worker.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    /// Worker id (pid).
    pub id: WorkerId,
    /// Current lifecycle state.
    pub state: WorkerState,
    handle: WorkerHandle,
}

impl WorkerRecord {
    /// Control handle of this worker.
    pub fn handle(&self) -> &WorkerHandle {
        &self.handle
    }
}

/// Registry of live workers in spawn order.
#[derive(Debug, Default)]
pub struct SupervisorState {
    workers: IndexMap<WorkerId, WorkerRecord>,
}

impl SupervisorState {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned worker as `Starting`.
    ///
    /// Returns `false` (and leaves the registry untouched) if the id is already present.
    pub fn insert(&mut self, handle: WorkerHandle) -> bool {
        let id = handle.id();
        if self.workers.contains_key(&id) {
            return false;
        }
        self.workers.insert(
            id,
            WorkerRecord {
                id,
                state: WorkerState::Starting,
                handle,
            },
        );
        true
    }

    /// Transitions a `Starting` worker to `Online`.
    ///
    /// Returns `true` only if a transition happened; unknown ids and workers
    /// already online are left alone.
    pub fn mark_online(&mut self, id: WorkerId) -> bool {
        match self.workers.get_mut(&id) {
            Some(rec) if rec.state == WorkerState::Starting => {
                rec.state = WorkerState::Online;
                true
            }
            _ => false,
        }
    }

    /// Removes a worker, returning its record in the `Exited` state.
    ///
    /// Keeps the relative order of the remaining records.
    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerRecord> {
        self.workers.shift_remove(&id).map(|mut rec| {
            rec.state = WorkerState::Exited;
            rec
        })
    }

    /// Looks up a live worker.
    pub fn get(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.workers.get(&id)
    }

    /// True if the worker is registered.
    pub fn contains(&self, id: WorkerId) -> bool {
        self.workers.contains_key(&id)
    }

    /// Number of live workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True if no worker is registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Worker ids in spawn order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    /// Iterates records in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.values()
    }

    /// Number of workers in the given state.
    pub fn count(&self, state: WorkerState) -> usize {
        self.workers.values().filter(|r| r.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn handle(pid: u32) -> WorkerHandle {
        let (tx, _rx) = mpsc::channel(1);
        WorkerHandle::new(WorkerId(pid), tx)
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut s = SupervisorState::new();
        assert!(s.insert(handle(1)));
        assert!(!s.insert(handle(1)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn online_only_from_starting() {
        let mut s = SupervisorState::new();
        s.insert(handle(1));
        assert!(s.mark_online(WorkerId(1)));
        assert!(!s.mark_online(WorkerId(1)));
        assert!(!s.mark_online(WorkerId(2)));
        assert_eq!(s.get(WorkerId(1)).unwrap().state, WorkerState::Online);
    }

    #[test]
    fn remove_preserves_order_and_marks_exited() {
        let mut s = SupervisorState::new();
        for pid in [10, 11, 12, 13] {
            s.insert(handle(pid));
        }
        let rec = s.remove(WorkerId(11)).unwrap();
        assert_eq!(rec.state, WorkerState::Exited);
        assert_eq!(s.ids(), vec![WorkerId(10), WorkerId(12), WorkerId(13)]);
        assert!(s.remove(WorkerId(11)).is_none());
        assert!(!s.mark_online(WorkerId(11)));
    }

    #[test]
    fn counts_by_state() {
        let mut s = SupervisorState::new();
        s.insert(handle(1));
        s.insert(handle(2));
        s.mark_online(WorkerId(2));
        assert_eq!(s.count(WorkerState::Starting), 1);
        assert_eq!(s.count(WorkerState::Online), 1);
    }
}
