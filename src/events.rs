//! Lifecycle notifications for provider observers.
//!
//! Listeners subscribe per [`EventKind`] and are invoked synchronously, in
//! registration order, whenever the provider emits. They are always called
//! without any provider lock held, so a listener may call back into the
//! provider (e.g. `send` from a `connect` listener).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Error;

/// Unique identifier for a listener registration.
pub type ListenerId = String;

/// Which lifecycle event a listener is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection ready and initial queue flushed.
    Connect,
    /// Transport failure or failed queued message.
    Error,
    /// Gateway closed the connection.
    Close,
}

/// An emitted lifecycle event.
#[derive(Debug)]
pub enum ProviderEvent {
    /// Connection ready and initial queue flushed.
    Connect,
    /// Transport failure or failed queued message.
    Error(Error),
    /// Gateway closed the connection.
    Close,
}

impl ProviderEvent {
    /// The kind listeners subscribe to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect => EventKind::Connect,
            Self::Error(_) => EventKind::Error,
            Self::Close => EventKind::Close,
        }
    }
}

type Listener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

/// Observer list shared between the provider and its connection task.
#[derive(Default)]
pub struct Listeners {
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        let total: usize = registry.listeners.values().map(Vec::len).sum();
        f.debug_struct("Listeners")
            .field("total_listeners", &total)
            .field("next_id", &registry.next_id)
            .finish()
    }
}

impl Listeners {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register `listener` for `kind`, returning an id for [`Self::unregister`].
    pub fn register<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ProviderEvent) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = format!("evt_{}", registry.next_id);
        registry.next_id += 1;

        registry
            .listeners
            .entry(kind)
            .or_default()
            .push((id.clone(), Arc::new(listener)));

        log::debug!("Registered listener '{}' for {:?}", id, kind);
        id
    }

    /// Remove a listener. Unknown ids are a no-op; returns whether one was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let mut registry = self.lock();
        for listeners in registry.listeners.values_mut() {
            if let Some(idx) = listeners.iter().position(|(existing, _)| existing == id) {
                listeners.remove(idx);
                return true;
            }
        }
        false
    }

    /// Invoke every listener registered for the event's kind.
    pub fn emit(&self, event: &ProviderEvent) {
        let targets: Vec<Listener> = self
            .lock()
            .listeners
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        if targets.is_empty() {
            if let ProviderEvent::Error(e) = event {
                log::warn!("[Gateway] Unobserved error: {}", e);
            }
            return;
        }

        for listener in targets {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_matching_kind_only() {
        let listeners = Listeners::default();
        let connects = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&connects);
        listeners.register(EventKind::Connect, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let e = Arc::clone(&errors);
        listeners.register(EventKind::Error, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&ProviderEvent::Connect);
        listeners.emit(&ProviderEvent::Error(Error::Closed));
        listeners.emit(&ProviderEvent::Error(Error::Closed));
        listeners.emit(&ProviderEvent::Close);

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unregister() {
        let listeners = Listeners::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let id = listeners.register(EventKind::Close, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(listeners.unregister(&id));
        assert!(!listeners.unregister(&id));
        listeners.emit(&ProviderEvent::Close);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let listeners = Arc::new(Listeners::default());
        let inner = Arc::clone(&listeners);
        listeners.register(EventKind::Connect, move |_| {
            inner.register(EventKind::Close, |_| {});
        });

        listeners.emit(&ProviderEvent::Connect);
        assert!(format!("{listeners:?}").contains("total_listeners: 2"));
    }
}
