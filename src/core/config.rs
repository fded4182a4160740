//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the centralized settings for the supervisor runtime.
//!
//! Config can be built in code (`SupervisorConfig::default()` + field edits)
//! or loaded from TOML with [`SupervisorConfig::from_toml_str`] /
//! [`SupervisorConfig::from_file`]. Every TOML key is optional:
//!
//! ```toml
//! workers = 4          # 0 = one worker per execution unit
//! fatal_code = 99
//! grace_ms = 10000
//! drain_ms = 1000
//! bus_capacity = 1024
//! event_capacity = 256
//!
//! [worker]
//! program = "/usr/local/bin/my-service"
//! args = ["--port", "3030"]
//! ```
//!
//! ## Sentinel values
//! - `workers = 0` → pool sized from `std::thread::available_parallelism()`

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::{FATAL_EXIT_CODE, RestartPolicy};
use crate::workers::{ServeOptions, WorkerProgram};

/// Global configuration for the supervisor runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct SupervisorConfig {
    /// Initial pool size.
    ///
    /// - `0` = one worker per available execution unit
    /// - `n > 0` = exactly `n` workers
    pub workers: usize,

    /// Exit code meaning "unrecoverable": workers exiting with it are not
    /// restarted, and the supervisor exits with it when the pool is exhausted.
    pub fatal_code: i32,

    /// Maximum time to wait for disconnected workers during shutdown before
    /// killing them.
    pub grace: Duration,

    /// How long a disconnected worker may drain before exiting.
    pub drain: Duration,

    /// Capacity of the observability bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Capacity of the worker event channel (min 1).
    pub event_capacity: usize,

    /// Program to run as a worker; `None` lets the caller decide
    /// (the binary re-executes itself).
    pub worker: Option<WorkerProgram>,
}

impl SupervisorConfig {
    /// Returns the target pool size, resolving `workers = 0` against the host.
    pub fn pool_size(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns an event channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn event_capacity_clamped(&self) -> usize {
        self.event_capacity.max(1)
    }

    /// Restart policy derived from `fatal_code`.
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::with_fatal_code(self.fatal_code)
    }

    /// Worker-side options derived from `drain` and `fatal_code`.
    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            drain: self.drain,
            fatal_code: self.fatal_code,
        }
    }

    /// Parses a TOML document on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown keys and
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        let mut cfg = Self::default();
        file.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, otherwise see
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `fatal_code` is not a usable process
    /// exit code (`1..=255`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=255).contains(&self.fatal_code) {
            return Err(ConfigError::Invalid {
                key: "fatal_code",
                reason: format!("{} is not in 1..=255", self.fatal_code),
            });
        }
        Ok(())
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `workers = 0` (one per execution unit)
    /// - `fatal_code = 99`
    /// - `grace = 10s`
    /// - `drain = 1s`
    /// - `bus_capacity = 1024`
    /// - `event_capacity = 256`
    /// - `worker = None`
    fn default() -> Self {
        Self {
            workers: 0,
            fatal_code: FATAL_EXIT_CODE,
            grace: Duration::from_secs(10),
            drain: Duration::from_secs(1),
            bus_capacity: 1024,
            event_capacity: 256,
            worker: None,
        }
    }
}

/// On-disk shape of the configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
struct FileConfig {
    workers: Option<usize>,
    fatal_code: Option<i32>,
    grace_ms: Option<u64>,
    drain_ms: Option<u64>,
    bus_capacity: Option<usize>,
    event_capacity: Option<usize>,
    worker: Option<FileWorker>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileWorker {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

impl FileConfig {
    fn apply(self, cfg: &mut SupervisorConfig) {
        if let Some(v) = self.workers {
            cfg.workers = v;
        }
        if let Some(v) = self.fatal_code {
            cfg.fatal_code = v;
        }
        if let Some(v) = self.grace_ms {
            cfg.grace = Duration::from_millis(v);
        }
        if let Some(v) = self.drain_ms {
            cfg.drain = Duration::from_millis(v);
        }
        if let Some(v) = self.bus_capacity {
            cfg.bus_capacity = v;
        }
        if let Some(v) = self.event_capacity {
            cfg.event_capacity = v;
        }
        if let Some(w) = self.worker {
            cfg.worker = Some(WorkerProgram::new(w.program).args(w.args));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = SupervisorConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, SupervisorConfig::default());
    }

    #[test]
    fn keys_override_defaults() {
        let cfg = SupervisorConfig::from_toml_str(
            r#"
            workers = 4
            fatal_code = 70
            grace_ms = 2500
            drain_ms = 0

            [worker]
            program = "node"
            args = ["server.js"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.pool_size(), 4);
        assert_eq!(cfg.fatal_code, 70);
        assert_eq!(cfg.restart_policy().fatal_code, 70);
        assert_eq!(cfg.grace, Duration::from_millis(2500));
        assert_eq!(cfg.drain, Duration::ZERO);
        assert_eq!(
            cfg.worker,
            Some(WorkerProgram::new("node").arg("server.js"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SupervisorConfig::from_toml_str("port = 3030").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn zero_fatal_code_is_invalid() {
        let err = SupervisorConfig::from_toml_str("fatal_code = 0").unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
    }

    #[test]
    fn zero_workers_means_host_sized() {
        let cfg = SupervisorConfig::default();
        assert!(cfg.pool_size() >= 1);
    }

    #[test]
    fn capacities_are_clamped() {
        let cfg = SupervisorConfig {
            bus_capacity: 0,
            event_capacity: 0,
            ..SupervisorConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.event_capacity_clamped(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SupervisorConfig::from_file("/nonexistent/procvisor.toml").unwrap_err();
        assert_eq!(err.as_label(), "config_read");
    }
}
