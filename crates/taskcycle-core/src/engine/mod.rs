//! Task engine.
//!
//! # Layout
//! - `context`: status cell, flags, listener dispatch
//! - `action`: the hooks supplied by the user
//! - `lifecycle`: the run protocol both variants share
//! - `sync_task` / `async_task`: the two variants
//! - `builder`: validated construction of `AsyncTask`
//! - `watchdog`, `validity`: timeout monitor and observable configuration
//!   flag of the asynchronous variant

pub mod action;
pub mod async_task;
pub mod builder;
pub mod context;
pub(crate) mod lifecycle;
pub mod sync_task;
pub mod validity;
pub(crate) mod watchdog;

pub use self::action::{FnAction, TaskAction};
pub use self::async_task::{AsyncTask, WaitError};
pub use self::builder::{AsyncTaskBuilder, BuildError};
pub use self::context::TaskContext;
pub use self::sync_task::SyncTask;
pub use self::validity::BindingError;
pub use self::watchdog::WatchdogInterrupted;

use std::sync::Arc;

use crate::domain::{RegistryError, RunId, TaskStatus};
use crate::listener::{CompletionListener, TaskListener};

/// Common surface of synchronous and asynchronous tasks.
///
/// Object safe, so heterogeneous tasks can be kept as `Box<dyn Task>`.
pub trait Task: Send + Sync {
    fn context(&self) -> &TaskContext;

    /// Start one run. Tasks are reusable: `perform` may be called again once
    /// the previous run ended.
    fn perform(&self);

    fn name(&self) -> &str {
        self.context().name()
    }

    fn status(&self) -> TaskStatus {
        self.context().status()
    }

    fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        self.context().add_listener(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn TaskListener>) -> Result<(), RegistryError> {
        self.context().remove_listener(listener)
    }

    fn add_completion_listener(&self, listener: Arc<dyn CompletionListener>) {
        self.context().add_completion_listener(listener);
    }

    fn remove_completion_listener(
        &self,
        listener: &Arc<dyn CompletionListener>,
    ) -> Result<(), RegistryError> {
        self.context().remove_completion_listener(listener)
    }

    /// Ask the running action to stop. Only honored by actions that poll it.
    fn set_stop_asked(&self, stop_asked: bool) {
        self.context().set_stop_asked(stop_asked);
    }

    fn is_stop_asked(&self) -> bool {
        self.context().is_stop_asked()
    }

    fn is_execution_failed(&self) -> bool {
        self.context().is_execution_failed()
    }

    fn last_run_id(&self) -> Option<RunId> {
        self.context().run_id()
    }
}
