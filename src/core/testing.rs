//! In-memory spawner for supervisor tests.
//!
//! Workers are plain tokio tasks. Ids come from a counter, so tests never
//! depend on real pids; lifecycle events are either injected by the test
//! through [`Supervisor::events`](crate::Supervisor::events) or produced by
//! the fake worker according to its [`FakeBehavior`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SpawnError;
use crate::workers::{Spawn, WorkerCommand, WorkerEvent, WorkerExit, WorkerHandle, WorkerId};

/// How a fake worker reacts to supervisor commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FakeBehavior {
    /// Records commands, never exits on its own.
    #[default]
    Passive,
    /// Exits 0 on disconnect, dies by SIGKILL on kill.
    Cooperative,
    /// Ignores disconnect, dies by SIGKILL on kill.
    IgnoreDisconnect,
}

#[derive(Default)]
struct Inner {
    next_id: u32,
    ids: Vec<WorkerId>,
    log: HashMap<WorkerId, Arc<Mutex<Vec<WorkerCommand>>>>,
    passive: HashMap<WorkerId, mpsc::Receiver<WorkerCommand>>,
}

pub(crate) struct FakeSpawner {
    behavior: FakeBehavior,
    fail_after: Option<usize>,
    inner: Mutex<Inner>,
}

impl FakeSpawner {
    pub(crate) fn new() -> Self {
        Self {
            behavior: FakeBehavior::default(),
            fail_after: None,
            inner: Mutex::new(Inner {
                next_id: 100,
                ..Inner::default()
            }),
        }
    }

    pub(crate) fn behavior(mut self, behavior: FakeBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Every spawn after the first `n` fails.
    pub(crate) fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Number of successful spawns so far.
    pub(crate) fn spawned(&self) -> usize {
        self.inner.lock().unwrap().ids.len()
    }

    /// Every id handed out, in spawn order.
    pub(crate) fn ids(&self) -> Vec<WorkerId> {
        self.inner.lock().unwrap().ids.clone()
    }

    /// Commands received by a worker so far.
    pub(crate) fn commands(&self, id: WorkerId) -> Vec<WorkerCommand> {
        let mut inner = self.inner.lock().unwrap();
        let Some(log) = inner.log.get(&id).cloned() else {
            return Vec::new();
        };
        if let Some(rx) = inner.passive.get_mut(&id) {
            while let Ok(cmd) = rx.try_recv() {
                log.lock().unwrap().push(cmd);
            }
        }
        let out = log.lock().unwrap().clone();
        out
    }

    /// Waits until at least `n` workers were spawned and returns all ids.
    pub(crate) async fn wait_for(&self, n: usize) -> Vec<WorkerId> {
        loop {
            let ids = self.ids();
            if ids.len() >= n {
                return ids;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl Spawn for FakeSpawner {
    async fn spawn(&self, events: mpsc::Sender<WorkerEvent>) -> Result<WorkerHandle, SpawnError> {
        let mut inner = self.inner.lock().unwrap();
        if self.fail_after.is_some_and(|n| inner.ids.len() >= n) {
            return Err(SpawnError::Other("fork refused".into()));
        }

        let id = WorkerId(inner.next_id);
        inner.next_id += 1;
        inner.ids.push(id);

        let log = Arc::new(Mutex::new(Vec::new()));
        inner.log.insert(id, log.clone());

        let (tx, rx) = mpsc::channel(8);
        match self.behavior {
            FakeBehavior::Passive => {
                inner.passive.insert(id, rx);
            }
            behavior => {
                tokio::spawn(fake_worker(id, behavior, rx, log, events));
            }
        }
        Ok(WorkerHandle::new(id, tx))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

async fn fake_worker(
    id: WorkerId,
    behavior: FakeBehavior,
    mut rx: mpsc::Receiver<WorkerCommand>,
    log: Arc<Mutex<Vec<WorkerCommand>>>,
    events: mpsc::Sender<WorkerEvent>,
) {
    while let Some(cmd) = rx.recv().await {
        log.lock().unwrap().push(cmd);
        let exit = match (cmd, behavior) {
            (WorkerCommand::Disconnect, FakeBehavior::Cooperative) => {
                WorkerExit::code(id, 0).after_disconnect()
            }
            (WorkerCommand::Disconnect, _) => continue,
            (WorkerCommand::Kill, _) => WorkerExit::signaled(id, 9, "SIGKILL"),
        };
        let _ = events.send(WorkerEvent::Exit(exit)).await;
        return;
    }
}
