//! taskcycle-core
//!
//! Lifecycle engine for unit-of-work tasks: a fixed status machine, a
//! before/perform/after hook protocol, observers, and synchronous or
//! asynchronous execution with an optional timeout watchdog.
//!
//! # Modules
//! - **domain**: status, end status, error taxonomy, run ids
//! - **listener**: observer traits, registry, logging and recording listeners
//! - **ports**: `ResultContext`, the seam deciding where callbacks run
//! - **impls**: `EventLoopContext`, a dedicated-thread result context
//! - **engine**: `TaskContext`, `TaskAction`, `SyncTask`, `AsyncTask`
//! - **config**: serde-loadable task settings

pub mod config;
pub mod domain;
pub mod engine;
pub mod impls;
pub mod listener;
pub mod ports;

pub use crate::config::TaskConfig;
pub use crate::domain::{BoxError, TaskEndStatus, TaskError, TaskErrorKind, TaskStatus};
pub use crate::engine::{AsyncTask, SyncTask, Task, TaskAction, TaskContext};
