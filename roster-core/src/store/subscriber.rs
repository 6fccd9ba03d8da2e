//! Subscriber types for stores and caches.
//!
//! A Subscriber is a listener callback registered against a store (notified
//! with each committed snapshot) or a query cache (notified with the key of
//! each entry that changed).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Handle returned by `subscribe`, needed to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate an id no other subscriber in the process holds.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A listener for events of type `E`.
pub struct Subscriber<E: ?Sized> {
    id: SubscriberId,
    /// Shared so the list can be snapshotted before listeners run.
    notify: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E: ?Sized> Subscriber<E> {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Arc::new(notify),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Deliver an event to the subscriber.
    pub fn notify(&self, event: &E) {
        (self.notify)(event);
    }
}

impl<E: ?Sized> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            notify: Arc::clone(&self.notify),
        }
    }
}

/// An ordered set of subscribers, notified in registration order.
pub struct SubscriberList<E: ?Sized> {
    subscribers: RwLock<Vec<Subscriber<E>>>,
}

impl<E: ?Sized> SubscriberList<E> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener and return its ID.
    pub fn add<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let subscriber = Subscriber::new(notify);
        let id = subscriber.id();
        self.subscribers.write().push(subscriber);
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id() != id);
        subscribers.len() != before
    }

    /// Notify every subscriber.
    ///
    /// The list is copied before any callback runs, so callbacks may
    /// subscribe, unsubscribe or re-enter the owner freely.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Subscriber<E>> = self.subscribers.read().clone();
        for subscriber in &snapshot {
            subscriber.notify(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl<E: ?Sized> Default for SubscriberList<E> {
    fn default() -> Self {
        Self::new()
    }
}
