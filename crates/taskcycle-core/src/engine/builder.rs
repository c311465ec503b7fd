//! AsyncTaskBuilder - wiring of an asynchronous task.
//!
//! Validation happens in `build()` so a misconfigured task never exists:
//! - a zero timeout is rejected (use no timeout instead)
//! - a tokio runtime must be reachable, given explicitly or current

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::TaskConfig;
use crate::engine::action::TaskAction;
use crate::engine::async_task::AsyncTask;
use crate::ports::{InlineContext, ResultContext};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("timeout must be greater than zero, leave it unset to disable the watchdog")]
    ZeroTimeout,

    #[error("no tokio runtime available: build inside a runtime or pass one with runtime()")]
    NoRuntime,
}

/// ```ignore
/// let task = AsyncTask::builder("import", ImportAction::new(path))
///     .timeout(Duration::from_secs(30))
///     .result_context(ui_context)
///     .build()?;
/// ```
pub struct AsyncTaskBuilder {
    name: String,
    action: Arc<dyn TaskAction>,
    timeout: Option<Duration>,
    result_context: Arc<dyn ResultContext>,
    runtime: Option<Handle>,
}

impl AsyncTaskBuilder {
    pub fn new(name: impl Into<String>, action: impl TaskAction) -> Self {
        Self {
            name: name.into(),
            action: Arc::new(action),
            timeout: None,
            result_context: Arc::new(InlineContext),
            runtime: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Where listener callbacks run. Defaults to `InlineContext`.
    pub fn result_context(mut self, result_context: Arc<dyn ResultContext>) -> Self {
        self.result_context = result_context;
        self
    }

    /// Runtime hosting the worker and the watchdog. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(mut self, config: &TaskConfig) -> Self {
        if let Some(name) = &config.name {
            self.name = name.clone();
        }
        if let Some(timeout) = config.timeout() {
            self.timeout = Some(timeout);
        }
        self
    }

    pub fn build(self) -> Result<AsyncTask, BuildError> {
        if let Some(timeout) = self.timeout
            && timeout.is_zero()
        {
            return Err(BuildError::ZeroTimeout);
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };
        Ok(AsyncTask::new(
            self.name,
            self.action,
            self.timeout,
            self.result_context,
            runtime,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoxError;
    use crate::engine::{Task, TaskContext};

    struct Noop;

    impl TaskAction for Noop {
        fn perform_action(&self, _task: &TaskContext) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn build_outside_runtime_fails() {
        let result = AsyncTaskBuilder::new("orphan", Noop).build();
        assert!(matches!(result, Err(BuildError::NoRuntime)));
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let result = AsyncTaskBuilder::new("t", Noop)
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(BuildError::ZeroTimeout)));
    }

    #[tokio::test]
    async fn config_overrides_name_and_timeout() {
        let config = TaskConfig {
            name: Some("from-config".to_string()),
            timeout_ms: Some(250),
        };
        let task = AsyncTaskBuilder::new("from-code", Noop)
            .timeout(Duration::from_secs(5))
            .config(&config)
            .build()
            .unwrap();
        assert_eq!(task.name(), "from-config");
        assert_eq!(task.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn explicit_runtime_is_accepted_outside_async_code() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let task = AsyncTaskBuilder::new("t", Noop)
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        assert_eq!(task.timeout(), None);
    }
}
