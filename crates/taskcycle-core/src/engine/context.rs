//! TaskContext - the shared state of one task.
//!
//! Both task variants and every hook talk to the same `TaskContext`. It owns
//! the status cell, the stop/failure flags and the listener registry, and it is
//! the only place where listeners get called.
//!
//! # Concurrency
//! - status and flags are atomics: the worker writes them, the caller and the
//!   watchdog read them (the watchdog also writes `Timeout` with a CAS)
//! - the registry is mutex-guarded and iterated through snapshots
//! - every listener call is routed through the task's `ResultContext`

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{
    BoxError, PanicFailure, RegistryError, RunId, TaskEndStatus, TaskError, TaskErrorKind,
    TaskStatus, format_message,
};
use crate::listener::{CompletionListener, ListenerRegistry, TaskListener};
use crate::ports::ResultContext;

struct Shared {
    name: String,
    status: AtomicU8,
    stop_asked: AtomicBool,
    execution_failed: AtomicBool,
    listeners: ListenerRegistry,
    result_context: Arc<dyn ResultContext>,
    run_id: Mutex<Option<RunId>>,
}

/// Cheap-to-clone handle on a task's state, passed to every hook.
#[derive(Clone)]
pub struct TaskContext {
    shared: Arc<Shared>,
}

impl TaskContext {
    pub(crate) fn new(name: String, result_context: Arc<dyn ResultContext>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                status: AtomicU8::new(TaskStatus::Created.as_u8()),
                stop_asked: AtomicBool::new(false),
                execution_failed: AtomicBool::new(false),
                listeners: ListenerRegistry::new(),
                result_context,
                run_id: Mutex::new(None),
            }),
        }
    }

    /// Task label. Not required to be unique.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.shared.status.load(Ordering::SeqCst))
    }

    /// Move to `new_status`, notifying listeners if the value changed.
    pub(crate) fn set_status(&self, new_status: TaskStatus) {
        let old_status =
            TaskStatus::from_u8(self.shared.status.swap(new_status.as_u8(), Ordering::SeqCst));
        if old_status == new_status {
            return;
        }
        tracing::info!(
            task = %self.name(),
            from = %old_status,
            to = %new_status,
            "changing task status"
        );
        self.send_status_change(old_status, new_status);
    }

    /// `Started -> Timeout`, only if the task is still `Started`.
    pub(crate) fn mark_timed_out(&self) -> bool {
        let swapped = self.shared.status.compare_exchange(
            TaskStatus::Started.as_u8(),
            TaskStatus::Timeout.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if swapped.is_err() {
            return false;
        }
        tracing::info!(
            task = %self.name(),
            from = %TaskStatus::Started,
            to = %TaskStatus::Timeout,
            "changing task status"
        );
        self.send_status_change(TaskStatus::Started, TaskStatus::Timeout);
        true
    }

    /// Cooperative cancellation flag. Actions may poll it while running.
    pub fn is_stop_asked(&self) -> bool {
        self.shared.stop_asked.load(Ordering::SeqCst)
    }

    pub fn set_stop_asked(&self, stop_asked: bool) {
        self.shared.stop_asked.store(stop_asked, Ordering::SeqCst);
    }

    /// Did anything fail while the action was running in the current run?
    pub fn is_execution_failed(&self) -> bool {
        self.shared.execution_failed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_execution_failed(&self) {
        self.shared.execution_failed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset_run_flags(&self) {
        self.shared.execution_failed.store(false, Ordering::SeqCst);
        self.shared.stop_asked.store(false, Ordering::SeqCst);
    }

    /// Identifier of the latest `perform()` call, if any.
    pub fn run_id(&self) -> Option<RunId> {
        *self.shared.run_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn next_run_id(&self) -> RunId {
        let run_id = RunId::generate();
        *self.shared.run_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(run_id);
        run_id
    }

    pub fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        self.shared.listeners.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TaskListener>) -> Result<(), RegistryError> {
        self.shared.listeners.remove_listener(listener)
    }

    pub fn add_completion_listener(&self, listener: Arc<dyn CompletionListener>) {
        self.shared.listeners.add_completion_listener(listener);
    }

    pub fn remove_completion_listener(
        &self,
        listener: &Arc<dyn CompletionListener>,
    ) -> Result<(), RegistryError> {
        self.shared.listeners.remove_completion_listener(listener)
    }

    /// Broadcast a message. `{}` placeholders in `message` are filled from
    /// `parameters`. Dropped (and only logged) when nobody listens.
    pub fn send_message(&self, message: &str, parameters: &[&dyn fmt::Display]) {
        if let Some(text) = self.prepare_message(message, parameters) {
            self.in_result_context(move |ctx| {
                ctx.notify_listeners(|listener| listener.on_message(&text));
            });
        }
    }

    /// Like `send_message`, delivered through `TaskListener::on_error_message`.
    pub fn send_error_message(&self, message: &str, parameters: &[&dyn fmt::Display]) {
        if let Some(text) = self.prepare_message(message, parameters) {
            self.in_result_context(move |ctx| {
                ctx.notify_listeners(|listener| listener.on_error_message(&text));
            });
        }
    }

    /// Report a failure of the given kind to the listeners.
    ///
    /// While the action is running the run is marked as failed, whatever the
    /// kind. A cause that already is a `TaskError` is delivered unchanged.
    pub fn send_error(&self, kind: TaskErrorKind, cause: BoxError, parameters: Vec<String>) {
        let status = self.status();
        if status.is_running() {
            self.mark_execution_failed();
        }
        let error = TaskError::from_cause(kind, cause, parameters);

        let listeners = self.shared.listeners.listener_count();
        if listeners == 0 {
            tracing::error!(
                task = %self.name(),
                status = %status,
                error = %error,
                "task error reported, but no listeners are registered to receive it"
            );
            return;
        }
        tracing::error!(task = %self.name(), status = %status, error = %error, listeners, "task error reported");

        self.in_result_context(move |ctx| {
            for listener in ctx.shared.listeners.listeners() {
                // not re-reported: a failing error handler would recurse
                if let Err(failure) = catch_panic(|| listener.on_error(&error)) {
                    tracing::error!(
                        task = %ctx.name(),
                        error = %failure,
                        "listener failed while handling a task error"
                    );
                }
            }
        });
    }

    /// Report a failure raised by the action itself, as `ExecutionFailed`.
    pub fn report_failure(&self, cause: BoxError) {
        self.send_error(TaskErrorKind::ExecutionFailed, cause, vec![self.name().to_string()]);
    }

    pub(crate) fn send_completion(&self, end_status: TaskEndStatus) {
        let listeners = self.shared.listeners.completion_listener_count();
        if listeners == 0 {
            return;
        }
        tracing::info!(task = %self.name(), end_status = %end_status, listeners, "sending completion event");

        self.in_result_context(move |ctx| {
            for listener in ctx.shared.listeners.completion_listeners() {
                if let Err(failure) = catch_panic(|| listener.on_finished(end_status)) {
                    tracing::error!(
                        task = %ctx.name(),
                        error = %failure,
                        "completion listener failed"
                    );
                }
            }
        });
    }

    fn send_status_change(&self, old_status: TaskStatus, new_status: TaskStatus) {
        let listeners = self.shared.listeners.listener_count();
        if listeners == 0 {
            return;
        }
        tracing::debug!(task = %self.name(), listeners, "sending status change event");
        self.in_result_context(move |ctx| {
            ctx.notify_listeners(|listener| listener.on_status_change(old_status, new_status));
        });
    }

    fn prepare_message(&self, message: &str, parameters: &[&dyn fmt::Display]) -> Option<String> {
        let parameters: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
        let text = format_message(message, &parameters);
        let listeners = self.shared.listeners.listener_count();
        if listeners == 0 {
            tracing::info!(
                task = %self.name(),
                message = %text,
                "message received, but no listeners are registered"
            );
            return None;
        }
        tracing::info!(task = %self.name(), listeners, "sending message [{text}]");
        Some(text)
    }

    /// Call `notify` for each listener; a panicking listener is reported as
    /// `ListenerNotificationFailed` and the others are still notified.
    fn notify_listeners(&self, notify: impl Fn(&dyn TaskListener)) {
        for listener in self.shared.listeners.listeners() {
            if let Err(failure) = catch_panic(|| notify(listener.as_ref())) {
                self.send_error(
                    TaskErrorKind::ListenerNotificationFailed,
                    Box::new(failure),
                    vec![self.name().to_string()],
                );
            }
        }
    }

    /// Run `notify` on the result context: in place when already there,
    /// queued otherwise.
    fn in_result_context(&self, notify: impl FnOnce(&TaskContext) + Send + 'static) {
        let result_context = &self.shared.result_context;
        if result_context.is_current() {
            notify(self);
            return;
        }
        let ctx = self.clone();
        let span = tracing::Span::current();
        result_context.execute(Box::new(move || {
            let _entered = span.enter();
            notify(&ctx);
        }));
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("name", &self.name())
            .field("status", &self.status())
            .field("stop_asked", &self.is_stop_asked())
            .field("execution_failed", &self.is_execution_failed())
            .finish()
    }
}

pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, PanicFailure> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(PanicFailure::from_payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::EventRecorder;
    use crate::ports::InlineContext;

    fn context() -> TaskContext {
        TaskContext::new("ctx".to_string(), Arc::new(InlineContext))
    }

    struct Exploding;

    impl TaskListener for Exploding {
        fn on_status_change(&self, _old: TaskStatus, _new: TaskStatus) {
            panic!("status handler exploded");
        }

        fn on_error(&self, _error: &TaskError) {
            panic!("error handler exploded");
        }
    }

    #[test]
    fn same_status_is_not_notified_twice() {
        let ctx = context();
        let recorder = Arc::new(EventRecorder::new());
        ctx.add_listener(recorder.clone());

        ctx.set_status(TaskStatus::Initialized);
        ctx.set_status(TaskStatus::Initialized);

        assert_eq!(recorder.statuses(), vec![TaskStatus::Initialized]);
    }

    #[test]
    fn timeout_only_replaces_started() {
        let ctx = context();
        ctx.set_status(TaskStatus::Stopping);
        assert!(!ctx.mark_timed_out());
        assert_eq!(ctx.status(), TaskStatus::Stopping);

        ctx.set_status(TaskStatus::Started);
        assert!(ctx.mark_timed_out());
        assert_eq!(ctx.status(), TaskStatus::Timeout);
    }

    #[test]
    fn messages_are_formatted() {
        let ctx = context();
        let recorder = Arc::new(EventRecorder::new());
        ctx.add_listener(recorder.clone());

        ctx.send_message("copied {} of {} files", &[&3, &10]);
        ctx.send_error_message("disk {} is full", &[&"sda"]);

        assert_eq!(
            recorder.messages(),
            vec!["copied 3 of 10 files", "ERROR: disk sda is full"]
        );
    }

    #[test]
    fn error_while_running_marks_failure_without_listeners() {
        let ctx = context();
        ctx.set_status(TaskStatus::Started);
        ctx.send_error(TaskErrorKind::CleanupFailed, "late".into(), vec![]);
        assert!(ctx.is_execution_failed());
    }

    #[test]
    fn error_outside_running_does_not_mark_failure() {
        let ctx = context();
        ctx.set_status(TaskStatus::Stopping);
        ctx.report_failure("cleanup".into());
        assert!(!ctx.is_execution_failed());
    }

    #[test]
    fn panicking_status_listener_is_reported_and_isolated() {
        let ctx = context();
        let recorder = Arc::new(EventRecorder::new());
        ctx.add_listener(Arc::new(Exploding));
        ctx.add_listener(recorder.clone());

        ctx.set_status(TaskStatus::Initialized);

        assert_eq!(recorder.statuses(), vec![TaskStatus::Initialized]);
        assert_eq!(
            recorder.error_kinds(),
            vec![TaskErrorKind::ListenerNotificationFailed]
        );
    }

    #[test]
    fn next_run_id_is_remembered() {
        let ctx = context();
        assert!(ctx.run_id().is_none());
        let run = ctx.next_run_id();
        assert_eq!(ctx.run_id(), Some(run));
    }
}
