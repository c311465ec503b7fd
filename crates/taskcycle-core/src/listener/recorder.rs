//! Listener keeping a timestamped log of everything a task reported.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CompletionListener, TaskListener};
use crate::domain::{TaskEndStatus, TaskError, TaskErrorKind, TaskStatus};

/// One notification as seen by a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    StatusChange { from: TaskStatus, to: TaskStatus },
    Message { text: String },
    Error { kind: TaskErrorKind, message: String, cause: String },
    Finished { end_status: TaskEndStatus },
}

/// A `TaskEvent` with delivery time and delivering thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub at: DateTime<Utc>,
    pub thread: Option<String>,
    pub event: TaskEvent,
}

/// Records every notification it receives, in delivery order.
///
/// Register the same `Arc<EventRecorder>` as task listener and as completion
/// listener to capture a full run.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    /// Target status of every recorded status change.
    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.lock()
            .iter()
            .filter_map(|e| match e.event {
                TaskEvent::StatusChange { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match &e.event {
                TaskEvent::Message { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn error_kinds(&self) -> Vec<TaskErrorKind> {
        self.lock()
            .iter()
            .filter_map(|e| match e.event {
                TaskEvent::Error { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn end_statuses(&self) -> Vec<TaskEndStatus> {
        self.lock()
            .iter()
            .filter_map(|e| match e.event {
                TaskEvent::Finished { end_status } => Some(end_status),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: TaskEvent) {
        let thread = std::thread::current().name().map(str::to_string);
        self.lock().push(RecordedEvent {
            at: Utc::now(),
            thread,
            event,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskListener for EventRecorder {
    fn on_status_change(&self, old_status: TaskStatus, new_status: TaskStatus) {
        self.record(TaskEvent::StatusChange {
            from: old_status,
            to: new_status,
        });
    }

    fn on_message(&self, message: &str) {
        self.record(TaskEvent::Message {
            text: message.to_string(),
        });
    }

    fn on_error(&self, error: &TaskError) {
        self.record(TaskEvent::Error {
            kind: error.kind(),
            message: error.message(),
            cause: error.cause().to_string(),
        });
    }
}

impl CompletionListener for EventRecorder {
    fn on_finished(&self, end_status: TaskEndStatus) {
        self.record(TaskEvent::Finished { end_status });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_delivery_order() {
        let recorder = EventRecorder::new();
        recorder.on_status_change(TaskStatus::Initialized, TaskStatus::Starting);
        recorder.on_message("hello");
        recorder.on_error_message("bad input");
        recorder.on_finished(TaskEndStatus::Aborted);

        assert_eq!(recorder.statuses(), vec![TaskStatus::Starting]);
        assert_eq!(recorder.messages(), vec!["hello", "ERROR: bad input"]);
        assert_eq!(recorder.end_statuses(), vec![TaskEndStatus::Aborted]);
        assert_eq!(recorder.events().len(), 4);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = TaskEvent::StatusChange {
            from: TaskStatus::Started,
            to: TaskStatus::Timeout,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "status_change", "from": "started", "to": "timeout" })
        );
    }
}
