//! Error taxonomy reported to task listeners.
//!
//! The engine never renders messages on its own: it assembles a
//! `(kind, cause, parameters)` tuple and lets the `ErrorIdentifier`
//! catalog turn it into text.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Error type accepted from task hooks.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Something that maps to a default, parameterized message template.
///
/// Templates use `{}` placeholders, filled left to right.
pub trait ErrorIdentifier {
    fn default_message(&self) -> &'static str;
}

/// Failure kinds a task can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The before hook failed; the run stops in `Starting`.
    InitializationFailed,

    /// A listener panicked while receiving a status change or a message.
    ListenerNotificationFailed,

    /// The action failed; the run continues to `Stopped`.
    ExecutionFailed,

    /// The after hook failed.
    CleanupFailed,

    /// The timeout watchdog was interrupted.
    TimeoutMonitorFailed,
}

impl ErrorIdentifier for TaskErrorKind {
    fn default_message(&self) -> &'static str {
        match self {
            TaskErrorKind::InitializationFailed => "Task [{}] : initialization failed",
            TaskErrorKind::ListenerNotificationFailed => {
                "An error occured while sending a notification to a listener for task [{}]."
            }
            TaskErrorKind::ExecutionFailed => "Task [{}] : execution failed",
            TaskErrorKind::CleanupFailed => "Task [{}] : cleaning failed",
            TaskErrorKind::TimeoutMonitorFailed => {
                "Task [{}] : error while trying to monitor task for timeout"
            }
        }
    }
}

/// An error delivered to `TaskListener::on_error`.
///
/// Immutable once built. The cause is shared so the error can be handed to
/// several listeners and across the result context.
#[derive(Debug, Clone)]
pub struct TaskError {
    kind: TaskErrorKind,
    cause: Arc<dyn Error + Send + Sync + 'static>,
    parameters: Vec<String>,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, cause: BoxError, parameters: Vec<String>) -> Self {
        Self {
            kind,
            cause: Arc::from(cause),
            parameters,
        }
    }

    /// Build an error from an arbitrary cause.
    ///
    /// A cause that already is a `TaskError` is forwarded unchanged, so
    /// nested reports keep their original kind.
    pub fn from_cause(kind: TaskErrorKind, cause: BoxError, parameters: Vec<String>) -> Self {
        match cause.downcast::<TaskError>() {
            Ok(task_error) => *task_error,
            Err(cause) => Self::new(kind, cause, parameters),
        }
    }

    pub fn kind(&self) -> TaskErrorKind {
        self.kind
    }

    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// The kind's template rendered against the parameters.
    pub fn message(&self) -> String {
        format_message(self.kind.default_message(), &self.parameters)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message(), self.cause)
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// A panic caught inside a hook or a listener.
#[derive(Debug, thiserror::Error)]
#[error("panicked: {message}")]
pub struct PanicFailure {
    message: String,
}

impl PanicFailure {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Listener registry misuse.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("listener has not been added to this task, it can't be removed")]
    ListenerNotRegistered,
}

/// Fill `{}` placeholders in `template` with `parameters`, left to right.
///
/// Surplus parameters are ignored; placeholders without a parameter are
/// kept verbatim.
pub fn format_message<S: AsRef<str>>(template: &str, parameters: &[S]) -> String {
    if parameters.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut params = parameters.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match params.next() {
            Some(param) => out.push_str(param.as_ref()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::no_params("plain text", &[], "plain text")]
    #[case::one("Task [{}] started", &["copy"], "Task [copy] started")]
    #[case::two("{} of {}", &["3", "10"], "3 of 10")]
    #[case::surplus("only {}", &["a", "b"], "only a")]
    #[case::missing("{} and {}", &["a"], "a and {}")]
    fn formats_placeholders(#[case] template: &str, #[case] params: &[&str], #[case] expected: &str) {
        assert_eq!(format_message(template, params), expected);
    }

    #[test]
    fn renders_kind_template_with_task_name() {
        let err = TaskError::new(
            TaskErrorKind::ExecutionFailed,
            "disk full".into(),
            vec!["backup".to_string()],
        );
        assert_eq!(err.message(), "Task [backup] : execution failed");
        assert_eq!(err.to_string(), "Task [backup] : execution failed: disk full");
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn existing_task_error_is_forwarded_as_is() {
        let inner = TaskError::new(
            TaskErrorKind::CleanupFailed,
            "lock held".into(),
            vec!["sync".to_string()],
        );
        let forwarded = TaskError::from_cause(
            TaskErrorKind::ExecutionFailed,
            Box::new(inner),
            vec!["other".to_string()],
        );
        assert_eq!(forwarded.kind(), TaskErrorKind::CleanupFailed);
        assert_eq!(forwarded.parameters(), ["sync".to_string()]);
    }

    #[test]
    fn foreign_cause_is_wrapped() {
        let wrapped = TaskError::from_cause(
            TaskErrorKind::ExecutionFailed,
            "boom".into(),
            vec!["t".to_string()],
        );
        assert_eq!(wrapped.kind(), TaskErrorKind::ExecutionFailed);
        assert_eq!(wrapped.cause().to_string(), "boom");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let caught = std::panic::catch_unwind(|| panic!("listener exploded")).unwrap_err();
        assert_eq!(PanicFailure::from_payload(caught).message(), "listener exploded");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42_u32)).unwrap_err();
        assert_eq!(
            PanicFailure::from_payload(caught).message(),
            "non-string panic payload"
        );
    }
}
