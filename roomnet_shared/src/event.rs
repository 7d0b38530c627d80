//! Session notifications and their observer list.
//!
//! Observers are called synchronously, in registration order, on whichever
//! context raises the event (the session's consumer context). Raising an
//! event with no observers registered does nothing.

use std::fmt;

/// Upward notifications raised by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    /// Connect attempt failed; carries a human-readable reason.
    ConnectionFailed(String),
    Disconnected,
    /// A line the session did not consume itself, verbatim.
    MessageReceived(String),
}

type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered fan-out of [`SessionEvent`]s.
#[derive(Default)]
pub struct Notifier {
    observers: Vec<(ObserverId, Observer)>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. It runs after every observer registered before it.
    pub fn subscribe<F>(&mut self, f: F) -> ObserverId
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(f)));
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    pub fn emit(&mut self, event: &SessionEvent) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn emit_without_observers_is_noop() {
        let mut n = Notifier::new();
        n.emit(&SessionEvent::Disconnected);
        assert!(n.is_empty());
    }

    #[test]
    fn observers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut n = Notifier::new();
        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            n.subscribe(move |e| log.lock().unwrap().push(format!("{tag}:{e:?}")));
        }
        n.emit(&SessionEvent::Connected);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:Connected", "second:Connected", "third:Connected"]
        );
    }

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let count = Arc::new(Mutex::new(0));
        let mut n = Notifier::new();
        let c = Arc::clone(&count);
        let id = n.subscribe(move |_| *c.lock().unwrap() += 1);
        n.emit(&SessionEvent::Connected);
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
        n.emit(&SessionEvent::Disconnected);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
