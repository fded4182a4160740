use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use procvisor::telemetry::{self, LogFormat};
use procvisor::{
    IpcMessage, LogWriter, ROLE_ENV, ROLE_WORKER, ServiceError, ServiceFn, ServiceRef, Supervisor,
    SupervisorConfig, WorkerContext, WorkerProgram,
};

/// Interval between heartbeat lines of the built-in worker service.
const HEARTBEAT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "procvisor", about = "Process-pool supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pool size; 0 means one worker per execution unit.
    #[arg(long)]
    workers: Option<usize>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run a single worker in this process, without a supervisor.
    #[arg(long)]
    no_cluster: bool,

    /// Worker command; defaults to this binary in worker role.
    #[arg(last = true)]
    command: Vec<OsString>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_format).context("failed to init tracing")?;

    let cfg = load_config(&cli)?;
    let code = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(dispatch(cli, cfg))?;

    std::process::exit(code);
}

fn load_config(cli: &Cli) -> Result<SupervisorConfig> {
    let mut cfg = match &cli.config {
        Some(path) => SupervisorConfig::from_file(path)?,
        None => SupervisorConfig::default(),
    };
    if let Some(workers) = cli.workers {
        cfg.workers = workers;
    }
    Ok(cfg)
}

async fn dispatch(cli: Cli, cfg: SupervisorConfig) -> Result<i32> {
    if std::env::var(ROLE_ENV).as_deref() == Ok(ROLE_WORKER) {
        return Ok(run_worker(cfg).await);
    }
    if cli.no_cluster {
        info!("cluster disabled; running a single worker in-process");
        return run_inline(cfg).await;
    }
    run_supervisor(cli, cfg).await
}

/// Built-in worker service: stays up until disconnected.
fn heartbeat() -> ServiceRef {
    ServiceFn::arc("heartbeat", |ctx: CancellationToken| async move {
        let mut ticks = tokio::time::interval(HEARTBEAT);
        ticks.tick().await;
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok::<_, ServiceError>(()),
                _ = ticks.tick() => debug!(pid = std::process::id(), "heartbeat"),
            }
        }
    })
}

async fn run_worker(cfg: SupervisorConfig) -> i32 {
    procvisor::serve(heartbeat(), WorkerContext::from_stdio(), cfg.serve_options()).await
}

/// Runs the worker service with an in-memory pipe standing in for the
/// supervisor; termination signals become a disconnect.
async fn run_inline(cfg: SupervisorConfig) -> Result<i32> {
    let (supervisor_end, worker_end) = tokio::io::duplex(4096);
    let (worker_rx, worker_tx) = tokio::io::split(worker_end);
    let (from_worker, mut to_worker) = tokio::io::split(supervisor_end);

    let ctx = WorkerContext::new(worker_rx, worker_tx);
    let worker = tokio::spawn(procvisor::serve(heartbeat(), ctx, cfg.serve_options()));

    tokio::spawn(async move {
        let mut lines = FramedRead::new(from_worker, LinesCodec::new());
        while let Some(Ok(line)) = lines.next().await {
            debug!(msg = ?IpcMessage::decode(&line), "worker message");
        }
    });

    procvisor::wait_for_shutdown_signal()
        .await
        .context("failed to install signal handlers")?;
    let line = format!("{}\n", IpcMessage::Disconnect.encode());
    to_worker.write_all(line.as_bytes()).await?;

    worker.await.context("worker task failed")
}

async fn run_supervisor(cli: Cli, mut cfg: SupervisorConfig) -> Result<i32> {
    if let Some((program, args)) = cli.command.split_first() {
        cfg.worker = Some(WorkerProgram::new(program).args(args.iter().cloned()));
    } else if cfg.worker.is_none() {
        let mut program = WorkerProgram::current_exe()
            .context("cannot resolve current executable")?
            .arg("--log-format")
            .arg(match cli.log_format {
                LogFormat::Text => "text",
                LogFormat::Json => "json",
            });
        if let Some(path) = &cli.config {
            program = program.arg("--config").arg(path);
        }
        cfg.worker = Some(program);
    }

    let sup = Supervisor::builder(cfg)
        .with_subscribers(vec![Arc::new(LogWriter)])
        .build()?;

    match sup.run().await {
        Ok(outcome) => {
            info!(?outcome, code = outcome.exit_code(), "supervisor exiting");
            Ok(outcome.exit_code())
        }
        Err(err) => {
            error!(error = %err, label = err.as_label(), "supervisor failed");
            Ok(1)
        }
    }
}
