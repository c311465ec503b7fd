//! SyncTask - runs the whole protocol on the caller's thread.

use std::sync::Arc;

use crate::domain::BoxError;
use crate::engine::Task;
use crate::engine::action::{FnAction, TaskAction};
use crate::engine::context::TaskContext;
use crate::engine::lifecycle::Lifecycle;
use crate::ports::{InlineContext, ResultContext};

/// A task whose `perform()` returns only after the run has ended.
///
/// Notifications are delivered on the caller's thread unless another result
/// context is supplied.
pub struct SyncTask {
    lifecycle: Lifecycle,
}

impl SyncTask {
    pub fn new(name: impl Into<String>, action: impl TaskAction) -> Self {
        Self::with_result_context(name, action, Arc::new(InlineContext))
    }

    pub fn with_result_context(
        name: impl Into<String>,
        action: impl TaskAction,
        result_context: Arc<dyn ResultContext>,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(name.into(), Arc::new(action), result_context),
        }
    }

    /// Task running a single closure as its action.
    pub fn from_fn<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&TaskContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::new(name, FnAction::new(action))
    }
}

impl Task for SyncTask {
    fn context(&self) -> &TaskContext {
        self.lifecycle.context()
    }

    fn perform(&self) {
        let span = self.lifecycle.start_run();
        let _entered = span.enter();
        if self.lifecycle.begin() {
            self.lifecycle.run_main(|| {});
        }
    }
}
