//! Synchronous publish/subscribe channel used to fan engine events out to
//! presentation layers.

use std::fmt;

/// Handle returned by [`EventChannel::subscribe`], used to unsubscribe exactly
/// the handler that was registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Retrieves the numeric representation of the subscription.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

struct Subscriber<E> {
    id: SubscriptionId,
    handler: Box<dyn FnMut(&E)>,
}

/// Ordered list of handlers invoked synchronously for every published event.
pub struct EventChannel<E> {
    subscribers: Vec<Subscriber<E>>,
    next_id: u64,
}

impl<E> EventChannel<E> {
    /// Creates a channel without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a handler and returns the identity needed to remove it.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.subscribers.push(Subscriber {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Removes the handler registered under `id`.
    ///
    /// Returns `false` when no such handler is registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Delivers the event to every handler in subscription order.
    pub fn publish(&mut self, event: &E) {
        for subscriber in &mut self.subscribers {
            (subscriber.handler)(event);
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscribers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
