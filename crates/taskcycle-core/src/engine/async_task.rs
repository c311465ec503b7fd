//! AsyncTask - runs the action on a worker, optionally under a watchdog.
//!
//! # Threads
//! - caller: `perform()` runs the before hook in place and returns
//! - worker: a blocking tokio task running the action and the after hook
//! - watchdog: an async tokio task, present only when a timeout is set
//!
//! Listener callbacks go through the result context from any of those.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::engine::Task;
use crate::engine::action::TaskAction;
use crate::engine::builder::AsyncTaskBuilder;
use crate::engine::context::TaskContext;
use crate::engine::lifecycle::Lifecycle;
use crate::engine::validity::{BindingError, ConfigurationFlag};
use crate::engine::watchdog::Watchdog;
use crate::ports::ResultContext;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("task worker did not finish cleanly: {0}")]
    Worker(#[source] JoinError),

    #[error("timeout monitor did not finish cleanly: {0}")]
    Watchdog(#[source] JoinError),
}

struct CurrentRun {
    worker: JoinHandle<()>,
    watchdog: Option<Watchdog>,
}

/// A task whose `perform()` returns as soon as the before hook has run.
///
/// Observe the end of a run through a completion listener, or `wait()` for it.
pub struct AsyncTask {
    lifecycle: Arc<Lifecycle>,
    runtime: Handle,
    timeout: Option<Duration>,
    configuration_valid: ConfigurationFlag,
    current_run: Mutex<Option<CurrentRun>>,
}

impl AsyncTask {
    pub fn builder(name: impl Into<String>, action: impl TaskAction) -> AsyncTaskBuilder {
        AsyncTaskBuilder::new(name, action)
    }

    pub(crate) fn new(
        name: String,
        action: Arc<dyn TaskAction>,
        timeout: Option<Duration>,
        result_context: Arc<dyn ResultContext>,
        runtime: Handle,
    ) -> Self {
        Self {
            lifecycle: Arc::new(Lifecycle::new(name, action, result_context)),
            runtime,
            timeout,
            configuration_valid: ConfigurationFlag::new(),
            current_run: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Wait until the worker and the watchdog of the latest run are done.
    ///
    /// Returns immediately when no run is in flight.
    pub async fn wait(&self) -> Result<(), WaitError> {
        let run = self.lock_run().take();
        let Some(run) = run else {
            return Ok(());
        };
        run.worker.await.map_err(WaitError::Worker)?;
        if let Some(watchdog) = run.watchdog {
            watchdog.into_handle().await.map_err(WaitError::Watchdog)?;
        }
        Ok(())
    }

    /// Wake the watchdog of the running run before its deadline. Reported to
    /// listeners as `TimeoutMonitorFailed`.
    pub fn interrupt_watchdog(&self) -> bool {
        self.lock_run()
            .as_ref()
            .and_then(|run| run.watchdog.as_ref())
            .is_some_and(Watchdog::interrupt)
    }

    /// Defaults to `true`. Not consulted by the engine itself.
    pub fn is_configuration_valid(&self) -> bool {
        self.configuration_valid.get()
    }

    pub fn set_configuration_valid(&self, valid: bool) -> Result<(), BindingError> {
        self.configuration_valid.set(valid)
    }

    pub fn subscribe_configuration_valid(&self) -> watch::Receiver<bool> {
        self.configuration_valid.subscribe()
    }

    /// Make the flag follow `source`. Direct writes fail while bound.
    pub fn bind_configuration_valid(&self, source: watch::Receiver<bool>) {
        self.configuration_valid.bind(&self.runtime, source);
    }

    pub fn unbind_configuration_valid(&self) {
        self.configuration_valid.unbind();
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<CurrentRun>> {
        self.current_run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Task for AsyncTask {
    fn context(&self) -> &TaskContext {
        self.lifecycle.context()
    }

    fn perform(&self) {
        let span = self.lifecycle.start_run();
        let _entered = span.enter();
        if !self.lifecycle.begin() {
            return;
        }

        let watchdog = self
            .timeout
            .map(|timeout| Watchdog::spawn(&self.runtime, self.context().clone(), timeout));
        let release = watchdog.as_ref().map(Watchdog::release_handle);

        let lifecycle = self.lifecycle.clone();
        let worker_span = span.clone();
        let worker = self.runtime.spawn_blocking(move || {
            let _entered = worker_span.enter();
            // the watchdog is released as soon as the action returns, so it
            // cannot fire or be interrupted once the run is winding down
            lifecycle.run_main(|| {
                if let Some(release) = release {
                    release.release();
                }
            });
        });
        tracing::debug!(timeout = ?self.timeout, "worker launched");

        // a previous run's handles are detached, not cancelled
        *self.lock_run() = Some(CurrentRun { worker, watchdog });
    }
}
