//! # Worker-side half of the supervisor contract.
//!
//! A worker process builds a [`WorkerContext`] on its stdio pipes and hands
//! its [`Service`] to [`serve`], which performs the whole handshake:
//!
//! ```text
//! serve(service, ctx, opts)
//!   ├─► service.init()         Fatal → exit(fatal_code), Fail → exit(1)
//!   ├─► ctx.report_online()    {"type":"online"} on stdout
//!   ├─► service.run(token)
//!   │     ├─ returns on its own          → exit code from result
//!   │     └─ token cancelled             (supervisor disconnect, stdin EOF,
//!   │                                     or ctx.request_stop())
//!   │           └─► wait up to opts.drain → exit(0)
//!   └─► process exit code
//! ```
//!
//! ## Rules
//! - `online` is written only after `init` succeeds.
//! - A stop request always writes `disconnect` to the supervisor *before* the
//!   service is cancelled, so the exit is classified as graceful.
//! - A panic inside the service is reported as a crash (exit 1).

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ServiceError;
use crate::policies::FATAL_EXIT_CODE;
use crate::workers::ipc::IpcMessage;
use crate::workers::ServiceRef;

type Writer = Pin<Box<dyn AsyncWrite + Send>>;

/// Worker-side IPC endpoint.
///
/// Cloning is cheap; all clones share the same pipe and cancellation token.
#[derive(Clone)]
pub struct WorkerContext {
    writer: Arc<Mutex<Writer>>,
    token: CancellationToken,
}

impl WorkerContext {
    /// Context over the process's own stdin/stdout, as wired by
    /// [`ProcessSpawner`](crate::workers::ProcessSpawner).
    pub fn from_stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Context over arbitrary pipes.
    ///
    /// Spawns a listener that cancels [`token`](Self::token) when the
    /// supervisor sends `disconnect` or closes the pipe.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + 'static,
    {
        let token = CancellationToken::new();
        tokio::spawn(listen(reader, token.clone()));
        Self {
            writer: Arc::new(Mutex::new(Box::pin(writer))),
            token,
        }
    }

    /// Token cancelled when the worker must stop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// True once a stop was requested from either side.
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Tells the supervisor the worker is ready.
    pub async fn report_online(&self) -> std::io::Result<()> {
        self.send(IpcMessage::Online).await
    }

    /// Asks the supervisor to retire this worker, then starts the local drain.
    ///
    /// The supervisor will not replace a worker that exits after this call.
    pub async fn request_stop(&self) -> std::io::Result<()> {
        let res = self.send(IpcMessage::Disconnect).await;
        self.token.cancel();
        res
    }

    async fn send(&self, msg: IpcMessage) -> std::io::Result<()> {
        let mut line = msg.encode();
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }
}

/// Reads supervisor messages until `disconnect` or EOF, then cancels `token`.
async fn listen<R>(reader: R, token: CancellationToken)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(4096));
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            line = lines.next() => match line {
                Some(Ok(line)) => match IpcMessage::decode(&line) {
                    Some(IpcMessage::Disconnect) => {
                        info!("disconnect requested by supervisor");
                        break;
                    }
                    Some(other) => debug!(?other, "unexpected message from supervisor"),
                    None => debug!(%line, "ignored supervisor input"),
                },
                Some(Err(err)) => {
                    warn!(%err, "supervisor pipe error");
                    break;
                }
                None => {
                    info!("supervisor pipe closed");
                    break;
                }
            },
        }
    }
    token.cancel();
}

/// Options for [`serve`].
#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    /// How long a disconnected service may keep draining before the worker exits.
    pub drain: Duration,
    /// Exit code used for fatal service errors.
    pub fatal_code: i32,
}

impl Default for ServeOptions {
    /// `drain = 1s`, `fatal_code = 99`.
    fn default() -> Self {
        Self {
            drain: Duration::from_secs(1),
            fatal_code: FATAL_EXIT_CODE,
        }
    }
}

/// Runs `service` as a supervised worker and returns the process exit code.
pub async fn serve(service: ServiceRef, ctx: WorkerContext, opts: ServeOptions) -> i32 {
    let name = service.name().to_owned();

    if let Err(err) = service.init().await {
        error!(service = %name, error = %err, label = err.as_label(), "service init failed");
        return err.exit_code(opts.fatal_code);
    }

    if let Err(err) = ctx.report_online().await {
        warn!(service = %name, %err, "could not report online");
    }
    info!(service = %name, "worker online");

    let token = ctx.token();
    let run = AssertUnwindSafe(service.run(token.clone())).catch_unwind();
    tokio::pin!(run);

    let finished = tokio::select! {
        res = &mut run => Some(res),
        _ = token.cancelled() => None,
    };

    let code = match finished {
        Some(res) => exit_code(&name, res, opts.fatal_code),
        None => match tokio::time::timeout(opts.drain, &mut run).await {
            Ok(res) => exit_code(&name, res, opts.fatal_code),
            Err(_elapsed) => {
                warn!(service = %name, drain = ?opts.drain, "drain timeout; exiting");
                0
            }
        },
    };

    info!(service = %name, code, "worker exiting");
    code
}

fn exit_code(
    name: &str,
    res: Result<Result<(), ServiceError>, Box<dyn std::any::Any + Send>>,
    fatal_code: i32,
) -> i32 {
    match res {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            if !matches!(err, ServiceError::Canceled) {
                error!(service = %name, error = %err, label = err.as_label(), "service stopped");
            }
            err.exit_code(fatal_code)
        }
        Err(_panic) => {
            error!(service = %name, "service panicked");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    use super::*;
    use crate::workers::ServiceFn;

    /// Supervisor end of a fake worker pipe pair.
    struct Peer {
        to_worker: tokio::io::DuplexStream,
        from_worker: BufReader<tokio::io::DuplexStream>,
    }

    impl Peer {
        async fn next_message(&mut self) -> Option<IpcMessage> {
            let mut line = String::new();
            self.from_worker.read_line(&mut line).await.ok()?;
            IpcMessage::decode(&line)
        }

        async fn disconnect(&mut self) {
            let line = format!("{}\n", IpcMessage::Disconnect.encode());
            self.to_worker.write_all(line.as_bytes()).await.unwrap();
        }
    }

    fn pair() -> (WorkerContext, Peer) {
        let (to_worker, worker_in) = duplex(1024);
        let (worker_out, from_worker) = duplex(1024);
        let ctx = WorkerContext::new(worker_in, worker_out);
        (
            ctx,
            Peer {
                to_worker,
                from_worker: BufReader::new(from_worker),
            },
        )
    }

    fn idle() -> ServiceRef {
        ServiceFn::arc("idle", |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn reports_online_then_exits_zero_on_disconnect() {
        let (ctx, mut peer) = pair();
        let worker = tokio::spawn(serve(idle(), ctx, ServeOptions::default()));

        assert_eq!(peer.next_message().await, Some(IpcMessage::Online));
        peer.disconnect().await;
        assert_eq!(worker.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn supervisor_pipe_closing_stops_the_worker() {
        let (ctx, mut peer) = pair();
        let worker = tokio::spawn(serve(idle(), ctx, ServeOptions::default()));

        assert_eq!(peer.next_message().await, Some(IpcMessage::Online));
        drop(peer.to_worker);
        assert_eq!(worker.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn request_stop_announces_disconnect_first() {
        let (ctx, mut peer) = pair();
        let stopper = ctx.clone();
        let worker = tokio::spawn(serve(idle(), ctx, ServeOptions::default()));

        assert_eq!(peer.next_message().await, Some(IpcMessage::Online));
        stopper.request_stop().await.unwrap();
        assert_eq!(peer.next_message().await, Some(IpcMessage::Disconnect));
        assert!(stopper.is_stopping());
        assert_eq!(worker.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fatal_init_exits_with_sentinel_before_online() {
        struct Broken;

        #[async_trait::async_trait]
        impl crate::Service for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            async fn init(&self) -> Result<(), ServiceError> {
                Err(ServiceError::Fatal {
                    error: "unexpected error".into(),
                })
            }
            async fn run(&self, _ctx: CancellationToken) -> Result<(), ServiceError> {
                unreachable!("run after failed init")
            }
        }

        let (ctx, mut peer) = pair();
        let code = serve(Arc::new(Broken), ctx, ServeOptions::default()).await;
        assert_eq!(code, 99);

        drop(peer.to_worker);
        let mut rest = String::new();
        let _ = tokio::time::timeout(
            Duration::from_millis(50),
            tokio::io::AsyncReadExt::read_to_string(&mut peer.from_worker, &mut rest),
        )
        .await;
        assert!(!rest.contains("online"));
    }

    #[tokio::test]
    async fn failing_service_exits_one() {
        let svc: ServiceRef = ServiceFn::arc("flaky", |_ctx: CancellationToken| async move {
            Err(ServiceError::Fail {
                error: "listen error".into(),
            })
        });
        let (ctx, _peer) = pair();
        assert_eq!(serve(svc, ctx, ServeOptions::default()).await, 1);
    }

    #[tokio::test]
    async fn panicking_service_exits_one() {
        let svc: ServiceRef = ServiceFn::arc("crash", |ctx: CancellationToken| async move {
            if !ctx.is_cancelled() {
                panic!("crash in the root flow");
            }
            Ok(())
        });
        let (ctx, _peer) = pair();
        assert_eq!(serve(svc, ctx, ServeOptions::default()).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_drain_is_cut_off() {
        let svc: ServiceRef = ServiceFn::arc("stubborn", |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        let (ctx, mut peer) = pair();
        let opts = ServeOptions {
            drain: Duration::from_millis(500),
            ..ServeOptions::default()
        };
        let worker = tokio::spawn(serve(svc, ctx, opts));

        assert_eq!(peer.next_message().await, Some(IpcMessage::Online));
        peer.disconnect().await;
        assert_eq!(worker.await.unwrap(), 0);
    }
}
