//! Single-slot register for the port the dev server is listening on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

pub type PortListener = Arc<dyn Fn(u16) + Send + Sync>;

/// Shared by every shell of one top-level session. Listeners run on the
/// caller's thread, outside any internal lock, in registration order.
#[derive(Default)]
pub struct PortCatcher {
    port: Mutex<Option<u16>>,
    added: Mutex<Vec<PortListener>>,
    removed: Mutex<Vec<PortListener>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PortCatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<u16> {
        *lock(&self.port)
    }

    pub fn on_added(&self, listener: impl Fn(u16) + Send + Sync + 'static) {
        lock(&self.added).push(Arc::new(listener));
    }

    pub fn on_removed(&self, listener: impl Fn(u16) + Send + Sync + 'static) {
        lock(&self.removed).push(Arc::new(listener));
    }

    /// Overwrite the slot. The previous port, if any, is announced as removed
    /// before the new one is announced as added.
    pub fn put_new_port(&self, port: u16) {
        let previous = lock(&self.port).replace(port);
        debug!(port, previous = ?previous, "port registered");
        if let Some(old) = previous {
            notify(&self.removed, old);
        }
        notify(&self.added, port);
    }

    /// Clear the slot. No-op when it is already empty.
    pub fn remove_port(&self) {
        let previous = lock(&self.port).take();
        if let Some(old) = previous {
            debug!(port = old, "port removed");
            notify(&self.removed, old);
        }
    }
}

fn notify(listeners: &Mutex<Vec<PortListener>>, port: u16) {
    let snapshot: Vec<PortListener> = lock(listeners).clone();
    for listener in snapshot {
        listener(port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(catcher: &PortCatcher) -> Arc<Mutex<Vec<String>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let added = Arc::clone(&events);
        catcher.on_added(move |p| added.lock().unwrap().push(format!("added {p}")));
        let removed = Arc::clone(&events);
        catcher.on_removed(move |p| removed.lock().unwrap().push(format!("removed {p}")));
        events
    }

    #[test]
    fn replacing_announces_removal_before_addition() {
        let catcher = PortCatcher::new();
        let events = recorder(&catcher);

        catcher.put_new_port(8080);
        catcher.put_new_port(3000);

        assert_eq!(
            *events.lock().unwrap(),
            vec!["added 8080", "removed 8080", "added 3000"]
        );
        assert_eq!(catcher.current(), Some(3000));
    }

    #[test]
    fn remove_without_port_is_silent() {
        let catcher = PortCatcher::new();
        let events = recorder(&catcher);

        catcher.remove_port();

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(catcher.current(), None);
    }

    #[test]
    fn remove_announces_and_clears() {
        let catcher = PortCatcher::new();
        catcher.put_new_port(5173);
        let events = recorder(&catcher);

        catcher.remove_port();
        catcher.remove_port();

        assert_eq!(*events.lock().unwrap(), vec!["removed 5173"]);
        assert_eq!(catcher.current(), None);
    }

    #[test]
    fn listener_may_reenter() {
        let catcher = Arc::new(PortCatcher::new());
        let inner = Arc::clone(&catcher);
        catcher.on_added(move |p| {
            if p == 1 {
                inner.put_new_port(2);
            }
        });
        catcher.put_new_port(1);
        assert_eq!(catcher.current(), Some(2));
    }
}
