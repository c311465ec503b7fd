//! The run protocol shared by both task variants.
//!
//! A run is split in two halves so the asynchronous variant can hand the
//! second one to a worker:
//! - `begin`: reset flags, `Starting`, before hook, abort checks
//! - `run_main`: `Started`, action, `Stopping`, after hook, `Stopped`, completion

use std::sync::Arc;

use crate::domain::{TaskEndStatus, TaskErrorKind, TaskStatus};
use crate::engine::action::{TaskAction, run_hook};
use crate::engine::context::TaskContext;
use crate::ports::ResultContext;

pub(crate) struct Lifecycle {
    context: TaskContext,
    action: Arc<dyn TaskAction>,
}

impl Lifecycle {
    /// Build the context, run the initialize hook, then move to `Initialized`.
    pub(crate) fn new(
        name: String,
        action: Arc<dyn TaskAction>,
        result_context: Arc<dyn ResultContext>,
    ) -> Self {
        let context = TaskContext::new(name, result_context);
        action.initialize(&context);
        context.set_status(TaskStatus::Initialized);
        Self { context, action }
    }

    pub(crate) fn context(&self) -> &TaskContext {
        &self.context
    }

    /// Open the span every log line of this run is attached to.
    pub(crate) fn start_run(&self) -> tracing::Span {
        let run_id = self.context.next_run_id();
        tracing::info_span!("task_run", task = %self.context.name(), run = %run_id)
    }

    /// First half of a run. Returns `false` when the run ends here.
    pub(crate) fn begin(&self) -> bool {
        let ctx = &self.context;
        tracing::info!("starting task");
        ctx.reset_run_flags();
        ctx.set_status(TaskStatus::Starting);

        match run_hook(|| self.action.before_action(ctx)) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("before hook declined the run");
                self.abort();
                return false;
            }
            Err(cause) => {
                ctx.send_error(
                    TaskErrorKind::InitializationFailed,
                    cause,
                    vec![ctx.name().to_string()],
                );
                tracing::warn!(
                    status = %ctx.status(),
                    "initialization failed, run ends without completion event"
                );
                return false;
            }
        }

        if ctx.is_stop_asked() {
            tracing::info!("stop requested during before hook");
            self.abort();
            return false;
        }
        true
    }

    /// Second half of a run.
    ///
    /// `action_done` runs once the action has returned (or was skipped),
    /// before any later status change or the completion event.
    pub(crate) fn run_main(&self, action_done: impl FnOnce()) {
        let ctx = &self.context;
        if ctx.is_stop_asked() {
            tracing::info!("stop requested before the action started");
            action_done();
            self.abort();
            return;
        }

        tracing::info!("performing action");
        ctx.set_status(TaskStatus::Started);
        match run_hook(|| self.action.perform_action(ctx)) {
            Ok(()) => tracing::info!("action performed"),
            Err(cause) => {
                ctx.mark_execution_failed();
                ctx.send_error(
                    TaskErrorKind::ExecutionFailed,
                    cause,
                    vec![ctx.name().to_string()],
                );
            }
        }
        action_done();

        ctx.set_status(TaskStatus::Stopping);
        if let Err(cause) = run_hook(|| self.action.after_action(ctx)) {
            ctx.send_error(
                TaskErrorKind::CleanupFailed,
                cause,
                vec![ctx.name().to_string()],
            );
        }
        ctx.set_status(TaskStatus::Stopped);

        let end_status = if ctx.is_execution_failed() {
            TaskEndStatus::ExecutionFailed
        } else {
            TaskEndStatus::ExecutionSuccess
        };
        tracing::info!(end_status = %end_status, "task finished");
        ctx.send_completion(end_status);
    }

    fn abort(&self) {
        tracing::info!("aborting task");
        self.context.set_status(TaskStatus::Stopped);
        self.context.send_completion(TaskEndStatus::Aborted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoxError, TaskEndStatus};
    use crate::listener::EventRecorder;
    use crate::ports::InlineContext;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Tracked {
        performed: Arc<AtomicBool>,
    }

    impl TaskAction for Tracked {
        fn perform_action(&self, _task: &TaskContext) -> Result<(), BoxError> {
            self.performed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn lifecycle() -> (Lifecycle, Arc<EventRecorder>, Arc<AtomicBool>) {
        let performed = Arc::new(AtomicBool::new(false));
        let lifecycle = Lifecycle::new(
            "late-stop".to_string(),
            Arc::new(Tracked {
                performed: performed.clone(),
            }),
            Arc::new(InlineContext),
        );
        let recorder = Arc::new(EventRecorder::new());
        lifecycle.context().add_listener(recorder.clone());
        lifecycle.context().add_completion_listener(recorder.clone());
        (lifecycle, recorder, performed)
    }

    #[test]
    fn stop_asked_between_halves_aborts_the_main_run() {
        let (lifecycle, recorder, performed) = lifecycle();
        let mut done_calls = 0;

        assert!(lifecycle.begin());
        lifecycle.context().set_stop_asked(true);
        lifecycle.run_main(|| done_calls += 1);

        assert_eq!(
            recorder.statuses(),
            vec![TaskStatus::Starting, TaskStatus::Stopped]
        );
        assert_eq!(recorder.end_statuses(), vec![TaskEndStatus::Aborted]);
        assert!(!performed.load(Ordering::SeqCst));
        assert_eq!(done_calls, 1);
    }

    #[test]
    fn action_done_runs_before_cleanup_and_completion() {
        let (lifecycle, recorder, performed) = lifecycle();
        let seen_at_done = std::sync::Mutex::new(Vec::new());

        assert!(lifecycle.begin());
        lifecycle.run_main(|| {
            seen_at_done
                .lock()
                .unwrap()
                .push((recorder.statuses().len(), recorder.end_statuses().len()));
        });

        assert!(performed.load(Ordering::SeqCst));
        // Starting and Started only; nothing after the action yet
        assert_eq!(*seen_at_done.lock().unwrap(), vec![(2, 0)]);
        assert_eq!(recorder.end_statuses(), vec![TaskEndStatus::ExecutionSuccess]);
    }
}
