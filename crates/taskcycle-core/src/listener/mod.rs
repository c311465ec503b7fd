//! Task observers.
//!
//! Two capability sets, both with no-op defaults so an observer implements
//! only what it cares about:
//! - **TaskListener**: status changes, messages and errors
//! - **CompletionListener**: the single end-of-run outcome
//!
//! Listeners are shared (`Arc`) with the task; the task never owns the
//! observer's state, and removal is by pointer identity.

pub mod logger;
pub mod recorder;
pub mod registry;

pub use self::logger::TaskLogger;
pub use self::recorder::{EventRecorder, RecordedEvent, TaskEvent};
pub use self::registry::ListenerRegistry;

use crate::domain::{TaskEndStatus, TaskError, TaskStatus};

/// Observer of status changes, messages and errors.
pub trait TaskListener: Send + Sync {
    fn on_status_change(&self, _old_status: TaskStatus, _new_status: TaskStatus) {}

    fn on_message(&self, _message: &str) {}

    /// Error text sent through the message channel.
    fn on_error_message(&self, message: &str) {
        self.on_message(&format!("ERROR: {message}"));
    }

    fn on_error(&self, _error: &TaskError) {}
}

/// Observer of run outcomes. Called exactly once per `perform()`.
pub trait CompletionListener: Send + Sync {
    fn on_finished(&self, end_status: TaskEndStatus);
}

impl<F> CompletionListener for F
where
    F: Fn(TaskEndStatus) + Send + Sync,
{
    fn on_finished(&self, end_status: TaskEndStatus) {
        self(end_status)
    }
}
