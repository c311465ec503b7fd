//! Listener forwarding task events to `tracing`.

use super::{CompletionListener, TaskListener};
use crate::domain::{TaskEndStatus, TaskError, TaskStatus};

/// Writes messages at info level and errors at error level.
///
/// Status changes go to debug; the engine already logs them at info.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task: String,
}

impl TaskLogger {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }
}

impl TaskListener for TaskLogger {
    fn on_status_change(&self, old_status: TaskStatus, new_status: TaskStatus) {
        tracing::debug!(task = %self.task, from = %old_status, to = %new_status, "status changed");
    }

    fn on_message(&self, message: &str) {
        tracing::info!(task = %self.task, "{message}");
    }

    fn on_error(&self, error: &TaskError) {
        tracing::error!(
            task = %self.task,
            kind = ?error.kind(),
            cause = %error.cause(),
            "{}",
            error.message()
        );
    }
}

impl CompletionListener for TaskLogger {
    fn on_finished(&self, end_status: TaskEndStatus) {
        tracing::info!(task = %self.task, end_status = %end_status, "task finished");
    }
}
