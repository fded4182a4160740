//! # Restart policy for worker exits.
//!
//! [`RestartPolicy`] classifies every worker exit into an [`ExitDecision`].
//! Rules are evaluated in order, first match wins:
//!
//! ```text
//! WorkerExit { code, signal, graceful }
//!   ├─ code == 0 || graceful  → Graceful  (terminal, no restart)
//!   ├─ code == fatal_code     → Fatal     (terminal, no restart)
//!   └─ otherwise              → Restart   (spawn a replacement)
//! ```
//!
//! A signal without a graceful disconnect is a crash: it carries a non-zero
//! code (`128 + signo`) and therefore lands in `Restart`, unless the signal
//! number happens to map onto the fatal code.

use crate::workers::WorkerExit;

/// Reserved exit code meaning "unrecoverable, do not restart".
///
/// Also used by the supervisor itself when the whole pool is exhausted.
pub const FATAL_EXIT_CODE: i32 = 99;

/// Outcome of evaluating a worker exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Intentional exit (code 0 or graceful disconnect): retire the worker.
    Graceful,
    /// Worker reported an unrecoverable condition: retire the worker.
    Fatal,
    /// Abnormal exit: spawn a replacement.
    Restart,
}

impl ExitDecision {
    /// True when a replacement worker must be spawned.
    #[inline]
    pub fn restarts(self) -> bool {
        matches!(self, ExitDecision::Restart)
    }

    /// Short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            ExitDecision::Graceful => "graceful",
            ExitDecision::Fatal => "fatal",
            ExitDecision::Restart => "restart",
        }
    }
}

/// Policy deciding what happens after a worker exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Exit code treated as the fatal sentinel.
    pub fatal_code: i32,
}

impl RestartPolicy {
    /// Policy with a custom fatal sentinel.
    pub fn with_fatal_code(fatal_code: i32) -> Self {
        Self { fatal_code }
    }

    /// Classifies one worker exit.
    pub fn decide(&self, exit: &WorkerExit) -> ExitDecision {
        if exit.code == 0 || exit.graceful {
            ExitDecision::Graceful
        } else if exit.code == self.fatal_code {
            ExitDecision::Fatal
        } else {
            ExitDecision::Restart
        }
    }
}

impl Default for RestartPolicy {
    /// Returns a policy with `fatal_code = 99`.
    fn default() -> Self {
        Self {
            fatal_code: FATAL_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerId;

    const ID: WorkerId = WorkerId(42);

    #[test]
    fn clean_exit_is_graceful() {
        let p = RestartPolicy::default();
        assert_eq!(p.decide(&WorkerExit::code(ID, 0)), ExitDecision::Graceful);
    }

    #[test]
    fn disconnect_wins_over_any_code() {
        let p = RestartPolicy::default();
        assert_eq!(
            p.decide(&WorkerExit::code(ID, 1).after_disconnect()),
            ExitDecision::Graceful
        );
        assert_eq!(
            p.decide(&WorkerExit::code(ID, 99).after_disconnect()),
            ExitDecision::Graceful
        );
        assert_eq!(
            p.decide(&WorkerExit::signaled(ID, 15, "SIGTERM").after_disconnect()),
            ExitDecision::Graceful
        );
    }

    #[test]
    fn sentinel_is_fatal() {
        let p = RestartPolicy::default();
        assert_eq!(p.decide(&WorkerExit::code(ID, 99)), ExitDecision::Fatal);
        assert!(!ExitDecision::Fatal.restarts());
    }

    #[test]
    fn crashes_restart() {
        let p = RestartPolicy::default();
        assert_eq!(p.decide(&WorkerExit::code(ID, 1)), ExitDecision::Restart);
        assert_eq!(p.decide(&WorkerExit::code(ID, -1)), ExitDecision::Restart);
        assert_eq!(
            p.decide(&WorkerExit::signaled(ID, 9, "SIGKILL")),
            ExitDecision::Restart
        );
    }

    #[test]
    fn custom_sentinel() {
        let p = RestartPolicy::with_fatal_code(70);
        assert_eq!(p.decide(&WorkerExit::code(ID, 70)), ExitDecision::Fatal);
        assert_eq!(p.decide(&WorkerExit::code(ID, 99)), ExitDecision::Restart);
    }
}
