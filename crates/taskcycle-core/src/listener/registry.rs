//! Listener registry owned by a task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CompletionListener, TaskListener};
use crate::domain::RegistryError;

/// Ordered collections of task and completion listeners.
///
/// Design:
/// - Adding never checks for duplicates; a listener added twice is notified twice.
/// - Removing takes out the first occurrence, matched by pointer identity.
/// - Callers iterate over a snapshot, so callbacks may add or remove listeners
///   (including themselves) while being notified. The change is visible from
///   the next notification on.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Arc<dyn TaskListener>>>,
    completion_listeners: Mutex<Vec<Arc<dyn CompletionListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        lock(&self.listeners).push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TaskListener>) -> Result<(), RegistryError> {
        remove_first(&mut lock(&self.listeners), listener)
    }

    pub fn add_completion_listener(&self, listener: Arc<dyn CompletionListener>) {
        lock(&self.completion_listeners).push(listener);
    }

    pub fn remove_completion_listener(
        &self,
        listener: &Arc<dyn CompletionListener>,
    ) -> Result<(), RegistryError> {
        remove_first(&mut lock(&self.completion_listeners), listener)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn completion_listener_count(&self) -> usize {
        lock(&self.completion_listeners).len()
    }

    /// Current task listeners, in registration order.
    pub fn listeners(&self) -> Vec<Arc<dyn TaskListener>> {
        lock(&self.listeners).clone()
    }

    /// Current completion listeners, in registration order.
    pub fn completion_listeners(&self) -> Vec<Arc<dyn CompletionListener>> {
        lock(&self.completion_listeners).clone()
    }
}

// A listener that panicked is caught outside the lock, so poisoning only
// happens if Vec itself panics; the data is still consistent then.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove_first<T: ?Sized>(items: &mut Vec<Arc<T>>, target: &Arc<T>) -> Result<(), RegistryError> {
    let position = items
        .iter()
        .position(|item| std::ptr::addr_eq(Arc::as_ptr(item), Arc::as_ptr(target)))
        .ok_or(RegistryError::ListenerNotRegistered)?;
    items.remove(position);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskEndStatus;

    struct Quiet;

    impl TaskListener for Quiet {}

    #[test]
    fn add_then_remove() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn TaskListener> = Arc::new(Quiet);

        registry.add_listener(listener.clone());
        assert_eq!(registry.listener_count(), 1);

        registry.remove_listener(&listener).unwrap();
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn removing_unknown_listener_fails() {
        let registry = ListenerRegistry::new();
        let registered: Arc<dyn TaskListener> = Arc::new(Quiet);
        let stranger: Arc<dyn TaskListener> = Arc::new(Quiet);
        registry.add_listener(registered);

        assert_eq!(
            registry.remove_listener(&stranger),
            Err(RegistryError::ListenerNotRegistered)
        );
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn removing_twice_fails() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn CompletionListener> = Arc::new(|_: TaskEndStatus| {});
        registry.add_completion_listener(listener.clone());

        assert!(registry.remove_completion_listener(&listener).is_ok());
        assert_eq!(
            registry.remove_completion_listener(&listener),
            Err(RegistryError::ListenerNotRegistered)
        );
    }

    #[test]
    fn duplicates_are_kept_and_removed_one_at_a_time() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn TaskListener> = Arc::new(Quiet);
        let other: Arc<dyn TaskListener> = Arc::new(Quiet);
        registry.add_listener(listener.clone());
        registry.add_listener(other.clone());
        registry.add_listener(listener.clone());
        assert_eq!(registry.listener_count(), 3);

        registry.remove_listener(&listener).unwrap();
        let left = registry.listeners();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&left[0]), Arc::as_ptr(&other)));
        assert!(std::ptr::addr_eq(Arc::as_ptr(&left[1]), Arc::as_ptr(&listener)));

        registry.remove_listener(&listener).unwrap();
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(
            registry.remove_listener(&listener),
            Err(RegistryError::ListenerNotRegistered)
        );
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn TaskListener> = Arc::new(Quiet);
        registry.add_listener(listener.clone());

        let snapshot = registry.listeners();
        registry.remove_listener(&listener).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(registry.listeners().is_empty());
    }
}
