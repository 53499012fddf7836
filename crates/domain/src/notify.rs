//! Change notifications published by command-driven aggregates.

use event_store::Event;
use serde_json::Value;

/// A change notification.
///
/// Notifications are fire-and-forget: each registered handler is called
/// once per notification, in registration order, and nothing is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<P, S> {
    /// An event was committed; `state` is the aggregate state right after it.
    Update { event: Event<P>, state: S },

    /// A command failed and left the aggregate unchanged.
    Error {
        command: String,
        args: Value,
        error: String,
    },
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<P, S> = Box<dyn Fn(&Notification<P, S>) + Send + Sync>;

/// Registered notification handlers.
pub(crate) struct Subscribers<P, S> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<P, S>)>,
}

impl<P, S> Subscribers<P, S> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn subscribe(
        &mut self,
        handler: impl Fn(&Notification<P, S>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    pub(crate) fn publish(&self, notification: &Notification<P, S>) {
        for (_, handler) in &self.handlers {
            handler(notification);
        }
    }
}
