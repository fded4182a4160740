//! # LogWriter: structured event logger
//!
//! A subscriber that renders every [`Event`] as one `tracing` record with
//! structured fields, so the pool history can be read straight from the logs.
//!
//! ## Example output (text format)
//! ```text
//! INFO worker spawned worker=4242 pool_before=3 pool_after=4
//! INFO worker online worker=4242
//! WARN worker exited worker=4242 code=137 signal="SIGKILL" graceful=false pool_before=4 pool_after=3 uptime_secs=12.5
//! WARN worker crashed, restarting worker=4242 code=137
//! INFO worker exited successfully, not restarting worker=4243 code=0
//! ERROR worker is fatal, will not be restarted worker=4244 code=99
//! ERROR worker pool exhausted code=99
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event logger subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.map(|w| w.0);
        match e.kind {
            EventKind::WorkerSpawned => {
                info!(
                    worker,
                    pool_before = e.pool_before,
                    pool_after = e.pool_after,
                    "worker spawned"
                );
            }
            EventKind::WorkerOnline => {
                info!(worker, "worker online");
            }
            EventKind::WorkerExited => {
                let graceful = e.graceful.unwrap_or(false);
                let uptime_secs = e.uptime.map(|d| d.as_secs_f64());
                if e.code == Some(0) || graceful {
                    info!(
                        worker,
                        code = e.code,
                        signal = e.signal.as_deref(),
                        graceful,
                        pool_before = e.pool_before,
                        pool_after = e.pool_after,
                        uptime_secs,
                        "worker exited"
                    );
                } else {
                    warn!(
                        worker,
                        code = e.code,
                        signal = e.signal.as_deref(),
                        graceful,
                        pool_before = e.pool_before,
                        pool_after = e.pool_after,
                        uptime_secs,
                        "worker exited"
                    );
                }
            }
            EventKind::WorkerRestarting => {
                warn!(
                    worker,
                    code = e.code,
                    signal = e.signal.as_deref(),
                    "worker crashed, restarting"
                );
            }
            EventKind::WorkerRetired => {
                info!(worker, code = e.code, "worker exited successfully, not restarting");
            }
            EventKind::WorkerFatal => {
                error!(worker, code = e.code, "worker is fatal, will not be restarted");
            }
            EventKind::PoolExhausted => {
                error!(code = e.code, "worker pool exhausted");
            }
            EventKind::ShutdownRequested => {
                info!(pool = e.pool_before, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("all workers stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!(pool = e.pool_before, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(reason = e.reason.as_deref(), "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(reason = e.reason.as_deref(), "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
