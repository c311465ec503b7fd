//! ResultContext port - where listener callbacks execute.

/// A unit of notification work handed to a result context.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// The single execution context on which task listeners are invoked.
///
/// Typically a UI or event thread. The engine calls `is_current()` first and
/// runs the callback in place when it returns true; otherwise the callback is
/// handed to `execute()`.
///
/// # Contract
/// - `execute()` must run callbacks in submission order.
/// - `execute()` must not block waiting for the callback to finish.
///
/// # Ordering
/// The worker and the timeout watchdog notify from different threads. Their
/// notifications are only ordered when both go through a queueing context.
/// With `InlineContext`, a `Timeout` change raised in the same instant the
/// action returns may reach listeners after `Stopping`.
pub trait ResultContext: Send + Sync {
    /// Is the calling thread the result context?
    fn is_current(&self) -> bool;

    /// Schedule `callback` to run on the result context.
    fn execute(&self, callback: Callback);
}

/// Runs every callback in place on the calling thread.
///
/// Default for both task variants: listeners run wherever the lifecycle runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContext;

impl ResultContext for InlineContext {
    fn is_current(&self) -> bool {
        true
    }

    fn execute(&self, callback: Callback) {
        callback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn inline_context_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let context = InlineContext;

        assert!(context.is_current());
        context.execute(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }
}
