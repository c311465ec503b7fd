//! Task configuration loadable from JSON (or any serde format).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings applied by `AsyncTaskBuilder::config`.
///
/// Every field is optional; a missing field leaves the builder's value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Overrides the name given to the builder.
    pub name: Option<String>,

    /// Watchdog timeout in milliseconds. `None` disables the watchdog.
    pub timeout_ms: Option<u64>,
}

impl TaskConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
