//! The hooks a task runs, in order: initialize, before, perform, after.

use crate::domain::BoxError;
use crate::engine::context::{TaskContext, catch_panic};

/// Work carried by a task.
///
/// Only `perform_action` is required. Hooks may report progress and failures
/// through the `TaskContext` they receive, and may poll
/// `TaskContext::is_stop_asked` to cooperate with a stop request or a timeout.
/// A panic in any hook is caught and treated like an `Err`.
pub trait TaskAction: Send + Sync + 'static {
    /// Runs once, while constructing the task (status `Created`).
    fn initialize(&self, _task: &TaskContext) {}

    /// Runs at the start of every `perform()` (status `Starting`).
    ///
    /// `Ok(false)` aborts the run.
    fn before_action(&self, _task: &TaskContext) -> Result<bool, BoxError> {
        Ok(true)
    }

    /// The work itself (status `Started`).
    fn perform_action(&self, task: &TaskContext) -> Result<(), BoxError>;

    /// Cleanup (status `Stopping`). Runs even when the action failed.
    fn after_action(&self, _task: &TaskContext) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A `TaskAction` made of a single closure.
pub struct FnAction<F> {
    action: F,
}

impl<F> FnAction<F>
where
    F: Fn(&TaskContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    pub fn new(action: F) -> Self {
        Self { action }
    }
}

impl<F> TaskAction for FnAction<F>
where
    F: Fn(&TaskContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn perform_action(&self, task: &TaskContext) -> Result<(), BoxError> {
        (self.action)(task)
    }
}

/// Run a fallible hook, turning a panic into an error.
pub(crate) fn run_hook<T>(hook: impl FnOnce() -> Result<T, BoxError>) -> Result<T, BoxError> {
    match catch_panic(hook) {
        Ok(result) => result,
        Err(failure) => Err(Box::new(failure)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PanicFailure;

    #[test]
    fn panicking_hook_becomes_an_error() {
        let result: Result<(), BoxError> = run_hook(|| panic!("hook exploded"));
        let err = result.unwrap_err();
        let failure = err.downcast_ref::<PanicFailure>().unwrap();
        assert_eq!(failure.message(), "hook exploded");
    }

    #[test]
    fn hook_errors_pass_through() {
        let result: Result<bool, BoxError> = run_hook(|| Err("declined".into()));
        assert_eq!(result.unwrap_err().to_string(), "declined");
        assert!(run_hook(|| Ok(true)).unwrap());
    }
}
