//! # OS-process worker launcher.
//!
//! [`ProcessSpawner`] starts each worker as a child process and attaches one
//! monitor task to it. The monitor is the only owner of the [`Child`]:
//!
//! ```text
//! ProcessSpawner::spawn()
//!   ├─► Command::spawn()  (stdin/stdout piped, stderr inherited, kill_on_drop)
//!   ├─► WorkerId = pid
//!   └─► tokio::spawn(monitor)
//!
//! monitor loop {
//!   ├─ stdout line  → {"type":"online"}     → WorkerEvent::Online (once)
//!   │               → {"type":"disconnect"} → mark graceful
//!   │               → anything else         → info!(worker output)
//!   ├─ WorkerCommand::Disconnect → write {"type":"disconnect"} to stdin, mark graceful
//!   ├─ WorkerCommand::Kill       → start_kill() (SIGKILL, not graceful)
//!   └─ child.wait()              → drain stdout, WorkerEvent::Exit, return
//! }
//! ```
//!
//! ## Rules
//! - The monitor emits `Online` at most once and `Exit` exactly once, in that order.
//! - Exits by signal are reported as `128 + signo` with the signal name.
//! - The child environment carries [`ROLE_ENV`]`=`[`ROLE_WORKER`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::error::SpawnError;
use crate::workers::ipc::IpcMessage;
use crate::workers::{Spawn, WorkerCommand, WorkerEvent, WorkerExit, WorkerHandle, WorkerId};

/// Environment variable telling a process which role it plays.
pub const ROLE_ENV: &str = "PROCVISOR_ROLE";
/// Value of [`ROLE_ENV`] set for every spawned worker.
pub const ROLE_WORKER: &str = "worker";

/// Longest stdout line accepted from a worker.
const MAX_LINE: usize = 64 * 1024;
/// How long to keep reading buffered stdout after the child has exited.
const DRAIN_STDOUT: Duration = Duration::from_millis(200);
/// Exit code reported when the OS could not tell us how the child ended.
const UNKNOWN_EXIT: i32 = 1;

/// Program and arguments used to start a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProgram {
    /// Executable path or name looked up in `PATH`.
    pub program: PathBuf,
    /// Command-line arguments.
    pub args: Vec<OsString>,
    /// Extra environment variables.
    pub env: Vec<(OsString, OsString)>,
}

impl WorkerProgram {
    /// A program with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// The currently running executable: workers are forks of the supervisor binary.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn display(&self) -> String {
        self.program.display().to_string()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .env(ROLE_ENV, ROLE_WORKER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

/// Launches workers as child processes of the supervisor.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: WorkerProgram,
}

impl ProcessSpawner {
    /// Creates a spawner for the given worker program.
    pub fn new(program: WorkerProgram) -> Self {
        Self { program }
    }

    /// The program every worker runs.
    pub fn program(&self) -> &WorkerProgram {
        &self.program
    }
}

#[async_trait]
impl Spawn for ProcessSpawner {
    async fn spawn(&self, events: mpsc::Sender<WorkerEvent>) -> Result<WorkerHandle, SpawnError> {
        let program = self.program.display();
        let mut child = self
            .program
            .command()
            .spawn()
            .map_err(|source| SpawnError::Io {
                program: program.clone(),
                source,
            })?;

        let pid = child.id().ok_or_else(|| SpawnError::NoPid {
            program: program.clone(),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| SpawnError::MissingPipe {
            program: program.clone(),
            pipe: "stdin",
        })?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe {
            program,
            pipe: "stdout",
        })?;

        let id = WorkerId(pid);
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(monitor(id, child, stdin, stdout, rx, events));
        Ok(WorkerHandle::new(id, tx))
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Owns one child process until it exits, translating its stdio and exit
/// status into [`WorkerEvent`]s.
async fn monitor(
    id: WorkerId,
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    mut commands: mpsc::Receiver<WorkerCommand>,
    events: mpsc::Sender<WorkerEvent>,
) {
    let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE));
    let mut online = false;
    let mut graceful = false;
    let mut stdout_open = true;
    let mut commands_open = true;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            line = lines.next(), if stdout_open => match line {
                Some(line) => {
                    handle_line(id, line, &mut online, &mut graceful, &events).await;
                }
                None => stdout_open = false,
            },
            cmd = commands.recv(), if commands_open => match cmd {
                Some(WorkerCommand::Disconnect) => {
                    graceful = true;
                    let msg = format!("{}\n", IpcMessage::Disconnect.encode());
                    if let Err(err) = stdin.write_all(msg.as_bytes()).await {
                        debug!(worker = %id, %err, "disconnect message not delivered");
                    } else if let Err(err) = stdin.flush().await {
                        debug!(worker = %id, %err, "disconnect message not flushed");
                    }
                }
                Some(WorkerCommand::Kill) => {
                    if let Err(err) = child.start_kill() {
                        warn!(worker = %id, %err, "failed to kill worker");
                    }
                }
                None => commands_open = false,
            },
        }
    };

    // Lines written right before exit may still be buffered in the pipe.
    if stdout_open {
        let drain = async {
            while let Some(line) = lines.next().await {
                handle_line(id, line, &mut online, &mut graceful, &events).await;
            }
        };
        let _ = tokio::time::timeout(DRAIN_STDOUT, drain).await;
    }

    let mut exit = match status {
        Ok(status) => exit_from_status(id, status),
        Err(err) => {
            warn!(worker = %id, %err, "failed to read worker exit status");
            WorkerExit::code(id, UNKNOWN_EXIT)
        }
    };
    exit.graceful = graceful;

    let _ = events.send(WorkerEvent::Exit(exit)).await;
}

async fn handle_line(
    id: WorkerId,
    line: Result<String, LinesCodecError>,
    online: &mut bool,
    graceful: &mut bool,
    events: &mpsc::Sender<WorkerEvent>,
) {
    let line = match line {
        Ok(line) => line,
        Err(LinesCodecError::MaxLineLengthExceeded) => {
            warn!(worker = %id, max = MAX_LINE, "worker output line too long; discarded");
            return;
        }
        Err(LinesCodecError::Io(err)) => {
            debug!(worker = %id, %err, "worker stdout read failed");
            return;
        }
    };

    match IpcMessage::decode(&line) {
        Some(IpcMessage::Online) if !*online => {
            *online = true;
            let _ = events.send(WorkerEvent::Online(id)).await;
        }
        Some(IpcMessage::Online) => {
            debug!(worker = %id, "duplicate online message ignored");
        }
        Some(IpcMessage::Disconnect) => {
            *graceful = true;
            info!(worker = %id, "worker requested disconnect");
        }
        None => info!(worker = %id, output = %line, "worker output"),
    }
}

/// Converts an OS exit status into a [`WorkerExit`] (graceful flag unset).
pub(crate) fn exit_from_status(id: WorkerId, status: ExitStatus) -> WorkerExit {
    if let Some(code) = status.code() {
        return WorkerExit::code(id, code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signo) = status.signal() {
            let name = nix::sys::signal::Signal::try_from(signo)
                .map(|sig| sig.as_str().to_owned())
                .unwrap_or_else(|_| format!("SIG{signo}"));
            return WorkerExit::signaled(id, signo, name);
        }
    }

    WorkerExit::code(id, UNKNOWN_EXIT)
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::process::ExitStatusExt;

    use super::*;

    #[test]
    fn exit_code_is_passed_through() {
        // Raw wait status: exit code in the second byte.
        let exit = exit_from_status(WorkerId(3), ExitStatus::from_raw(99 << 8));
        assert_eq!(exit, WorkerExit::code(WorkerId(3), 99));
    }

    #[test]
    fn signal_is_named() {
        let exit = exit_from_status(WorkerId(3), ExitStatus::from_raw(9));
        assert_eq!(exit.code, 137);
        assert_eq!(exit.signal.as_deref(), Some("SIGKILL"));
    }

    #[test]
    fn worker_role_is_exported() {
        let program = WorkerProgram::new("sh").arg("-c").arg("true");
        let cmd = program.command();
        let envs: Vec<_> = cmd.as_std().get_envs().collect();
        assert!(envs.iter().any(|(k, v)| {
            k.to_str() == Some(ROLE_ENV) && v.and_then(|v| v.to_str()) == Some(ROLE_WORKER)
        }));
    }
}
