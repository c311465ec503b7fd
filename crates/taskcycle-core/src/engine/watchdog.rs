//! Timeout monitor for asynchronous runs.
//!
//! One watchdog per run. It sleeps for the configured timeout; if the task is
//! still `Started` when it wakes up, the status becomes `Timeout` and the
//! action is asked to stop. Nothing is killed: the action decides when it
//! returns.
//!
//! The worker releases the watchdog as soon as the action returns, so neither
//! a timeout nor an interrupt can be raised once cleanup has begun. A timeout
//! whose compare-and-swap won just before the release still notifies, possibly
//! after `Stopping` (see `ResultContext`).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::domain::TaskErrorKind;
use crate::engine::context::TaskContext;

/// Cause reported when the watchdog is interrupted before its deadline.
#[derive(Debug, thiserror::Error)]
#[error("timeout monitor was interrupted before its deadline")]
pub struct WatchdogInterrupted;

type Interrupt = Arc<Mutex<Option<oneshot::Sender<()>>>>;

pub(crate) struct Watchdog {
    handle: JoinHandle<()>,
    interrupt: Interrupt,
}

/// Held by the worker; dropping the interrupt sender tells the watchdog the
/// run is over and it can exit quietly.
pub(crate) struct Release {
    interrupt: Interrupt,
}

impl Watchdog {
    pub(crate) fn spawn(runtime: &Handle, context: TaskContext, timeout: Duration) -> Self {
        let (sender, receiver) = oneshot::channel();
        let span = tracing::Span::current();
        let handle = runtime.spawn(watch(context, timeout, receiver).instrument(span));
        Self {
            handle,
            interrupt: Arc::new(Mutex::new(Some(sender))),
        }
    }

    pub(crate) fn release_handle(&self) -> Release {
        Release {
            interrupt: self.interrupt.clone(),
        }
    }

    /// Wake the watchdog before its deadline. Returns `false` if it already
    /// finished or was released.
    pub(crate) fn interrupt(&self) -> bool {
        let sender = take(&self.interrupt);
        sender.is_some_and(|sender| sender.send(()).is_ok())
    }

    pub(crate) fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }
}

impl Release {
    pub(crate) fn release(self) {
        drop(take(&self.interrupt));
    }
}

fn take(interrupt: &Interrupt) -> Option<oneshot::Sender<()>> {
    interrupt.lock().unwrap_or_else(PoisonError::into_inner).take()
}

async fn watch(context: TaskContext, timeout: Duration, interrupt: oneshot::Receiver<()>) {
    tokio::select! {
        _ = tokio::time::sleep(timeout) => {
            if context.mark_timed_out() {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "task exceeded its timeout, asking it to stop"
                );
                context.set_stop_asked(true);
            }
        }
        signal = interrupt => {
            // Err: released by the worker, the run ended in time
            if signal.is_ok() {
                context.send_error(
                    TaskErrorKind::TimeoutMonitorFailed,
                    Box::new(WatchdogInterrupted),
                    vec![context.name().to_string()],
                );
            }
        }
    }
}
