//! EventLoopContext - a dedicated thread acting as the result context.
//!
//! Stands in for a UI or event thread: callbacks submitted from any thread
//! are queued on an unbounded channel and run one at a time, in order, on the
//! loop thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc;

use crate::domain::PanicFailure;
use crate::ports::{Callback, ResultContext};

#[derive(Debug, thiserror::Error)]
pub enum EventLoopError {
    #[error("failed to spawn event loop thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("event loop cannot be shut down from its own thread")]
    ShutdownFromLoop,

    #[error("event loop thread panicked")]
    Panicked,
}

/// Result context backed by one named thread.
///
/// - `is_current()` is true only on the loop thread.
/// - Dropping the context closes the queue; the thread finishes the callbacks
///   already queued and exits on its own. Use `shutdown()` to wait for that.
pub struct EventLoopContext {
    sender: Mutex<Option<mpsc::UnboundedSender<Callback>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoopContext {
    /// Start the loop thread.
    pub fn spawn(name: impl Into<String>) -> Result<Self, EventLoopError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Callback>();
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            while let Some(callback) = receiver.blocking_recv() {
                // keep the loop alive for the callbacks queued behind this one
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                    let failure = PanicFailure::from_payload(payload);
                    tracing::warn!(error = %failure, "result context callback panicked");
                }
            }
            tracing::debug!("event loop drained, exiting");
        })?;

        Ok(Self {
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Close the queue and wait until every queued callback has run.
    ///
    /// Calling it again after a successful shutdown is a no-op.
    pub fn shutdown(&self) -> Result<(), EventLoopError> {
        if self.is_current() {
            return Err(EventLoopError::ShutdownFromLoop);
        }
        drop(lock(&self.sender).take());
        let handle = lock(&self.handle).take();
        match handle {
            Some(handle) => handle.join().map_err(|_| EventLoopError::Panicked),
            None => Ok(()),
        }
    }
}

impl ResultContext for EventLoopContext {
    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn execute(&self, callback: Callback) {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            tracing::warn!("event loop is shut down, dropping notification");
            return;
        };
        if sender.send(callback).is_err() {
            tracing::warn!("event loop thread is gone, dropping notification");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn callbacks_run_on_loop_thread_in_order() {
        let context = Arc::new(EventLoopContext::spawn("results").unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        assert!(!context.is_current());
        for i in 0..5 {
            let seen = seen.clone();
            let ctx = context.clone();
            context.execute(Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                seen.lock().unwrap().push((i, name, ctx.is_current()));
            }));
        }
        context.shutdown().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        for (expected, (i, name, current)) in seen.iter().enumerate() {
            assert_eq!(*i, expected);
            assert_eq!(name.as_deref(), Some("results"));
            assert!(current);
        }
    }

    #[test]
    fn panicking_callback_does_not_stop_the_loop() {
        let context = EventLoopContext::spawn("results").unwrap();
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();

        context.execute(Box::new(|| panic!("bad listener")));
        context.execute(Box::new(move || *flag.lock().unwrap() = true));
        context.shutdown().unwrap();

        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn execute_after_shutdown_is_dropped() {
        let context = EventLoopContext::spawn("results").unwrap();
        context.shutdown().unwrap();
        context.execute(Box::new(|| unreachable!("loop is closed")));
        assert!(context.shutdown().is_ok());
    }
}
