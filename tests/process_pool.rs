//! End-to-end checks with real `sh` child processes.
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use procvisor::{
    Event, EventKind, ProcessSpawner, RuntimeError, Supervisor, SupervisorConfig, Termination,
    WorkerProgram,
};

const LIMIT: Duration = Duration::from_secs(10);

fn shell(workers: usize, script: &str) -> Supervisor {
    let cfg = SupervisorConfig {
        workers,
        grace: Duration::from_secs(2),
        ..SupervisorConfig::default()
    };
    let program = WorkerProgram::new("sh").arg("-c").arg(script);
    Supervisor::builder(cfg)
        .with_spawner(Arc::new(ProcessSpawner::new(program)))
        .build()
        .unwrap()
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

#[tokio::test]
async fn fatal_workers_exhaust_the_pool() {
    let sup = shell(2, "exit 99");
    let mut rx = sup.subscribe();

    let outcome = tokio::time::timeout(LIMIT, sup.run_until(std::future::pending()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Termination::Exhausted { code: 99 });

    let events = drain(&mut rx);
    let kinds = kinds(&events);
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::WorkerSpawned).count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::WorkerFatal).count(), 2);
    assert!(!kinds.contains(&EventKind::WorkerRestarting));
    assert_eq!(kinds.last(), Some(&EventKind::PoolExhausted));
}

#[tokio::test]
async fn killed_worker_is_replaced() {
    let marker = std::env::temp_dir().join(format!("procvisor-crash-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);
    let script = format!(
        "if [ -e '{m}' ]; then exit 99; else touch '{m}'; kill -9 $$; fi",
        m = marker.display()
    );

    let sup = shell(1, &script);
    let mut rx = sup.subscribe();
    let outcome = tokio::time::timeout(LIMIT, sup.run_until(std::future::pending()))
        .await
        .unwrap()
        .unwrap();
    let _ = std::fs::remove_file(&marker);
    assert_eq!(outcome, Termination::Exhausted { code: 99 });

    let events = drain(&mut rx);
    let restart = events
        .iter()
        .find(|e| e.kind == EventKind::WorkerRestarting)
        .expect("crashed worker was not restarted");
    assert_eq!(restart.code, Some(137));
    assert_eq!(restart.signal.as_deref(), Some("SIGKILL"));

    let spawned: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::WorkerSpawned)
        .filter_map(|e| e.worker)
        .collect();
    assert_eq!(spawned.len(), 2);
    assert_ne!(spawned[0], spawned[1]);
}

#[tokio::test]
async fn self_disconnect_is_not_replaced() {
    let sup = shell(1, r#"printf '{"type":"disconnect"}\n'; exit 3"#);
    let mut rx = sup.subscribe();

    let outcome = tokio::time::timeout(LIMIT, sup.run_until(std::future::pending()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Termination::Exhausted { code: 99 });

    let events = drain(&mut rx);
    let exited = events
        .iter()
        .find(|e| e.kind == EventKind::WorkerExited)
        .unwrap();
    assert_eq!(exited.code, Some(3));
    assert_eq!(exited.graceful, Some(true));
    assert!(kinds(&events).contains(&EventKind::WorkerRetired));
}

#[tokio::test]
async fn online_workers_stop_on_shutdown() {
    let sup = shell(2, r#"printf '{"type":"online"}\n'; read line; exit 0"#);
    let mut rx = sup.subscribe();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let run = tokio::spawn(sup.run_until(async move {
        let _ = stop_rx.await;
        Ok(())
    }));

    let mut online = 0;
    while online < 2 {
        let ev = tokio::time::timeout(LIMIT, rx.recv()).await.unwrap().unwrap();
        if ev.kind == EventKind::WorkerOnline {
            online += 1;
        }
    }
    stop_tx.send(()).unwrap();

    let outcome = tokio::time::timeout(LIMIT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, Termination::Shutdown);

    let events = drain(&mut rx);
    let exits: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::WorkerExited)
        .collect();
    assert_eq!(exits.len(), 2);
    assert!(exits.iter().all(|e| e.graceful == Some(true) && e.code == Some(0)));
    assert_eq!(kinds(&events).last(), Some(&EventKind::AllStoppedWithin));
}

#[tokio::test]
async fn missing_program_fails_to_start() {
    let cfg = SupervisorConfig {
        workers: 1,
        ..SupervisorConfig::default()
    };
    let program = WorkerProgram::new("/nonexistent/procvisor-worker");
    let sup = Supervisor::builder(cfg)
        .with_spawner(Arc::new(ProcessSpawner::new(program)))
        .build()
        .unwrap();

    let err = sup.run_until(std::future::pending()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Spawn(_)));
}
