//! Error types used by the procvisor runtime and by worker services.
//!
//! This module defines the main error enums:
//!
//! - [`RuntimeError`]: errors raised by the supervisor itself.
//! - [`SpawnError`]: a worker process could not be created.
//! - [`ServiceError`]: errors raised by a worker-side [`Service`](crate::Service).
//! - [`ConfigError`]: configuration could not be read or is invalid.
//!
//! Each type provides an `as_label` helper for logs/metrics.

use std::time::Duration;

use thiserror::Error;

use crate::workers::WorkerId;

/// # Errors produced by the supervisor runtime.
///
/// These represent failures of the control plane, not of individual workers.
/// A crashing worker is never an error here: it is handled by the restart policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `start()` was called on a supervisor that already owns a pool.
    #[error("supervisor already started")]
    AlreadyStarted,

    /// A worker process could not be created; the pool would run below capacity.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] SpawnError),

    /// Shutdown grace period was exceeded; remaining workers were killed.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Workers still registered when the grace period ran out.
        stuck: Vec<WorkerId>,
    },

    /// A spawner returned an id that is still registered.
    #[error("worker {0} is already registered")]
    DuplicateWorker(WorkerId),

    /// Installing the OS signal handlers failed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    /// The worker event channel closed while workers were still registered.
    #[error("worker event channel closed with {live} worker(s) registered")]
    ChannelClosed {
        /// Number of records still in the registry.
        live: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::Spawn(_) => "runtime_spawn_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::DuplicateWorker(_) => "runtime_duplicate_worker",
            RuntimeError::Signal(_) => "runtime_signal_install",
            RuntimeError::ChannelClosed { .. } => "runtime_channel_closed",
        }
    }
}

/// # Errors produced while launching a worker.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The OS refused to create the process.
    #[error("cannot start `{program}`: {source}")]
    Io {
        /// Program that was being launched.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process started but exited before its pid could be read.
    #[error("`{program}` exited before reporting a pid")]
    NoPid {
        /// Program that was being launched.
        program: String,
    },

    /// The stdio pipes used for IPC were not available.
    #[error("`{program}` has no {pipe} pipe")]
    MissingPipe {
        /// Program that was being launched.
        program: String,
        /// Which pipe was missing (`stdin` / `stdout`).
        pipe: &'static str,
    },

    /// A custom spawner failed for its own reasons.
    #[error("{0}")]
    Other(String),
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::Io { .. } => "spawn_io",
            SpawnError::NoPid { .. } => "spawn_no_pid",
            SpawnError::MissingPipe { .. } => "spawn_missing_pipe",
            SpawnError::Other(_) => "spawn_other",
        }
    }
}

/// # Errors produced by a worker service.
///
/// The variant decides the worker's process exit code, and therefore what the
/// supervisor does next (see [`ServiceError::exit_code`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Non-recoverable error: the worker must not be restarted.
    #[error("fatal error (no restart): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The service failed but a fresh worker may succeed.
    #[error("service failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The service stopped because the worker was disconnected.
    #[error("context cancelled")]
    Canceled,
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::ServiceError;
    ///
    /// let err = ServiceError::Fatal { error: "bad config".into() };
    /// assert_eq!(err.as_label(), "service_fatal");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Fatal { .. } => "service_fatal",
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Canceled => "service_canceled",
        }
    }

    /// Process exit code the worker reports for this error.
    ///
    /// - `Fatal` → `fatal_code` (the sentinel, no restart)
    /// - `Fail` → `1` (crash, restarted)
    /// - `Canceled` → `0` (intentional)
    pub fn exit_code(&self, fatal_code: i32) -> i32 {
        match self {
            ServiceError::Fatal { .. } => fatal_code,
            ServiceError::Fail { .. } => 1,
            ServiceError::Canceled => 0,
        }
    }

    /// Indicates whether the supervisor will replace a worker that fails this way.
    ///
    /// # Example
    /// ```
    /// use procvisor::ServiceError;
    ///
    /// assert!(ServiceError::Fail { error: "boom".into() }.is_restartable());
    /// assert!(!ServiceError::Fatal { error: "nope".into() }.is_restartable());
    /// ```
    pub fn is_restartable(&self) -> bool {
        matches!(self, ServiceError::Fail { .. })
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value `{key}`: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}
