//! Inbound event subscriptions.
//!
//! Handlers are registered per [`EventKind`] and receive decoded, typed
//! events. Every registration returns a [`Subscription`] guard; dropping the
//! guard unregisters the handler, so a room teardown that drops its guards
//! cannot leak handlers into the next room.
//!
//! Dispatch snapshots the matching handlers and releases the registry lock
//! before calling them, so a handler may subscribe or drop guards. A handler
//! must not dispatch on the same bus.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use cutroom_proto::InboundEvent;

/// Inbound event names that can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// `newMessage`
    NewMessage,
    /// `messageDeleted`
    MessageDeleted,
    /// `userTyping`
    UserTyping,
    /// `error`, also raised locally when reconnection gives up
    Error,
}

impl EventKind {
    /// Every kind, in wire order.
    pub const ALL: [Self; 4] =
        [Self::NewMessage, Self::MessageDeleted, Self::UserTyping, Self::Error];

    /// Kind of a decoded event.
    pub fn of(event: &InboundEvent) -> Self {
        match event {
            InboundEvent::NewMessage(_) => Self::NewMessage,
            InboundEvent::MessageDeleted(_) => Self::MessageDeleted,
            InboundEvent::UserTyping(_) => Self::UserTyping,
            InboundEvent::Error(_) => Self::Error,
        }
    }

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::NewMessage => "newMessage",
            Self::MessageDeleted => "messageDeleted",
            Self::UserTyping => "userTyping",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Handler = Arc<Mutex<dyn FnMut(&InboundEvent) + Send>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<u64, (EventKind, Handler)>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking handler must not take the whole bus down with it.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handler registry shared between a client and its subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("subscribers", &self.subscriber_count()).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// The handler stays registered until the returned guard is dropped.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        let handler: Handler = Arc::new(Mutex::new(handler));
        registry.handlers.insert(id, (kind, handler));
        tracing::trace!(%kind, id, "subscribed");

        Subscription { id, kind, registry: Arc::downgrade(&self.registry) }
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers called.
    pub fn dispatch(&self, event: &InboundEvent) -> usize {
        let kind = EventKind::of(event);
        let handlers: Vec<Handler> = lock(&self.registry)
            .handlers
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in &handlers {
            let mut handler = lock(handler);
            (*handler)(event);
        }
        handlers.len()
    }

    /// Number of registered handlers across all kinds.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).handlers.len()
    }

    /// Number of registered handlers for one kind.
    pub fn subscriber_count_for(&self, kind: EventKind) -> usize {
        lock(&self.registry).handlers.values().filter(|(k, _)| *k == kind).count()
    }
}

/// Guard for a registered handler. Unregisters on drop.
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Kind this subscription listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Unregister now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).field("kind", &self.kind).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            // Released outside the lock: the handler may own other guards.
            let removed = lock(&registry).handlers.remove(&self.id);
            drop(removed);
            tracing::trace!(kind = %self.kind, id = self.id, "unsubscribed");
        }
    }
}
