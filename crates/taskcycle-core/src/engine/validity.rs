//! Observable "configuration valid" flag of an asynchronous task.
//!
//! The flag lives in a `watch` channel so a host can subscribe to it, e.g. to
//! enable or disable a start button. It may also be bound to another `watch`
//! source, in which case it follows that source and refuses direct writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("configuration-valid flag is bound to another source, unbind it first")]
    Bound,
}

pub(crate) struct ConfigurationFlag {
    sender: Arc<watch::Sender<bool>>,
    binding: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigurationFlag {
    /// Valid until told otherwise.
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(true);
        Self {
            sender: Arc::new(sender),
            binding: Mutex::new(None),
        }
    }

    pub(crate) fn get(&self) -> bool {
        *self.sender.borrow()
    }

    pub(crate) fn set(&self, valid: bool) -> Result<(), BindingError> {
        if self.is_bound() {
            return Err(BindingError::Bound);
        }
        self.sender.send_replace(valid);
        Ok(())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Follow `source` until it closes or `unbind` is called. Replaces any
    /// previous binding.
    pub(crate) fn bind(&self, runtime: &Handle, mut source: watch::Receiver<bool>) {
        self.unbind();
        self.sender.send_replace(*source.borrow_and_update());

        let sender = self.sender.clone();
        let forward = runtime.spawn(async move {
            while source.changed().await.is_ok() {
                let valid = *source.borrow_and_update();
                sender.send_replace(valid);
            }
            tracing::debug!("configuration source closed, flag unbound");
        });
        *self.lock_binding() = Some(forward);
    }

    pub(crate) fn unbind(&self) {
        if let Some(forward) = self.lock_binding().take() {
            forward.abort();
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.lock_binding()
            .as_ref()
            .is_some_and(|forward| !forward.is_finished())
    }

    fn lock_binding(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConfigurationFlag {
    fn drop(&mut self) {
        self.unbind();
    }
}
