//! Lifecycle status of a task and the outcome of one run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a task.
///
/// Transitions:
/// - Created -> Initialized (construction, after the initialize hook)
/// - Initialized -> Starting (perform)
/// - Starting -> Stopped (abort: before hook declined, or stop requested)
/// - Starting -> Started -> Stopping -> Stopped (main run)
///
/// `Timeout` is an overlay raised by the watchdog while the task is `Started`;
/// the run still moves on to `Stopping` and `Stopped` once the action returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskStatus {
    /// Constructed, initialize hook not finished yet.
    Created = 0,

    /// Ready to be performed.
    Initialized = 1,

    /// Running the before hook.
    Starting = 2,

    /// Running the action itself.
    Started = 3,

    /// Running the after hook.
    Stopping = 4,

    /// Run finished (or aborted).
    Stopped = 5,

    /// Running for longer than the configured timeout; not stopped.
    Timeout = 6,
}

impl TaskStatus {
    /// Only `Stopped` ends a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Stopped)
    }

    /// Is the action currently executing (possibly past its timeout)?
    pub fn is_running(self) -> bool {
        matches!(self, TaskStatus::Started | TaskStatus::Timeout)
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskStatus::Created,
            1 => TaskStatus::Initialized,
            2 => TaskStatus::Starting,
            3 => TaskStatus::Started,
            4 => TaskStatus::Stopping,
            5 => TaskStatus::Stopped,
            6 => TaskStatus::Timeout,
            // the status cell is only ever written through as_u8
            other => unreachable!("invalid task status encoding: {other}"),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Created => "created",
            TaskStatus::Initialized => "initialized",
            TaskStatus::Starting => "starting",
            TaskStatus::Started => "started",
            TaskStatus::Stopping => "stopping",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TaskStatus::Created),
            "initialized" => Ok(TaskStatus::Initialized),
            "starting" => Ok(TaskStatus::Starting),
            "started" => Ok(TaskStatus::Started),
            "stopping" => Ok(TaskStatus::Stopping),
            "stopped" => Ok(TaskStatus::Stopped),
            "timeout" => Ok(TaskStatus::Timeout),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Outcome of one `perform()` call, delivered to completion listeners only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEndStatus {
    ExecutionSuccess,
    ExecutionFailed,
    Aborted,
}

impl TaskEndStatus {
    pub fn is_success(self) -> bool {
        matches!(self, TaskEndStatus::ExecutionSuccess)
    }
}

impl fmt::Display for TaskEndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskEndStatus::ExecutionSuccess => "execution_success",
            TaskEndStatus::ExecutionFailed => "execution_failed",
            TaskEndStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskEndStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "execution_success" => Ok(TaskEndStatus::ExecutionSuccess),
            "execution_failed" => Ok(TaskEndStatus::ExecutionFailed),
            "aborted" => Ok(TaskEndStatus::Aborted),
            _ => Err(format!("Invalid task end status: {s}")),
        }
    }
}
