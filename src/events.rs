//! Event dispatch for connection notifications.
//!
//! Each event kind carries an independent subscriber list. Firing invokes
//! all current subscribers in registration order; a kind with zero
//! subscribers is a safe no-op. Unsubscription removes exactly one handler
//! without disturbing the order of the others; the connection relies on
//! this to detach old-transport bridges before teardown.
//!
//! # Invocation Context
//!
//! Handlers run on whatever thread fires the event: the caller's thread for
//! events raised inside a public operation, the transport's delivery context
//! for bridge-originated events. Handlers are invoked outside any dispatcher
//! lock, so a handler may re-enter the connection (for example, call
//! `close()` from an error handler) or manage subscriptions.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Error;

// ============================================================================
// EventKind
// ============================================================================

/// The notification kinds a connection can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connect attempt succeeded; the connection is open.
    Opened,
    /// The connection transitioned to closed.
    Closed,
    /// The connection was disposed.
    Disposed,
    /// A fault was redirected to the event channel.
    Error,
    /// An inbound text message arrived.
    Message,
    /// A pong (native or simulated) arrived.
    Pong,
    /// A human-readable lifecycle log line.
    Log,
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle returned by a subscribe call; pass it back to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Returns the event kind this subscription is registered for.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }
}

// ============================================================================
// HandlerList
// ============================================================================

/// Handler callback type for payload `T`.
type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered subscriber list for one event kind.
///
/// Registration order is preserved across unsubscription. Emission snapshots
/// the list under the lock and invokes outside it.
struct HandlerList<T> {
    kind: EventKind,
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<T>)>>,
}

impl<T> HandlerList<T> {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().push((id, Arc::new(handler)));
        Subscription {
            kind: self.kind,
            id,
        }
    }

    fn unsubscribe(&self, subscription: &Subscription) {
        self.handlers.lock().retain(|(id, _)| *id != subscription.id);
    }

    fn emit(&self, payload: &T) {
        // Snapshot so handlers can subscribe/unsubscribe reentrantly.
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(payload);
        }
    }

    fn len(&self) -> usize {
        self.handlers.lock().len()
    }
}

// ============================================================================
// ConnectionEvents
// ============================================================================

/// Per-connection subscriber registry, one list per [`EventKind`].
///
/// Owned by the connection; subscriber lists live exactly as long as it.
pub(crate) struct ConnectionEvents {
    opened: HandlerList<()>,
    closed: HandlerList<()>,
    disposed: HandlerList<crate::connection::Connection>,
    error: HandlerList<Error>,
    message: HandlerList<String>,
    pong: HandlerList<String>,
    log: HandlerList<String>,
}

impl ConnectionEvents {
    pub(crate) fn new() -> Self {
        Self {
            opened: HandlerList::new(EventKind::Opened),
            closed: HandlerList::new(EventKind::Closed),
            disposed: HandlerList::new(EventKind::Disposed),
            error: HandlerList::new(EventKind::Error),
            message: HandlerList::new(EventKind::Message),
            pong: HandlerList::new(EventKind::Pong),
            log: HandlerList::new(EventKind::Log),
        }
    }

    // ------------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------------

    pub(crate) fn subscribe_opened(
        &self,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.opened.subscribe(move |()| handler())
    }

    pub(crate) fn subscribe_closed(
        &self,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.closed.subscribe(move |()| handler())
    }

    pub(crate) fn subscribe_disposed(
        &self,
        handler: impl Fn(&crate::connection::Connection) + Send + Sync + 'static,
    ) -> Subscription {
        self.disposed.subscribe(handler)
    }

    pub(crate) fn subscribe_error(
        &self,
        handler: impl Fn(&Error) + Send + Sync + 'static,
    ) -> Subscription {
        self.error.subscribe(handler)
    }

    pub(crate) fn subscribe_message(
        &self,
        handler: impl Fn(&str) + Send + Sync + 'static,
    ) -> Subscription {
        self.message.subscribe(move |text: &String| handler(text))
    }

    pub(crate) fn subscribe_pong(
        &self,
        handler: impl Fn(&str) + Send + Sync + 'static,
    ) -> Subscription {
        self.pong.subscribe(move |text: &String| handler(text))
    }

    pub(crate) fn subscribe_log(
        &self,
        handler: impl Fn(&str) + Send + Sync + 'static,
    ) -> Subscription {
        self.log.subscribe(move |text: &String| handler(text))
    }

    pub(crate) fn unsubscribe(&self, subscription: &Subscription) {
        match subscription.kind() {
            EventKind::Opened => self.opened.unsubscribe(subscription),
            EventKind::Closed => self.closed.unsubscribe(subscription),
            EventKind::Disposed => self.disposed.unsubscribe(subscription),
            EventKind::Error => self.error.unsubscribe(subscription),
            EventKind::Message => self.message.unsubscribe(subscription),
            EventKind::Pong => self.pong.unsubscribe(subscription),
            EventKind::Log => self.log.unsubscribe(subscription),
        }
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    pub(crate) fn emit_opened(&self) {
        self.opened.emit(&());
    }

    pub(crate) fn emit_closed(&self) {
        self.closed.emit(&());
    }

    pub(crate) fn emit_disposed(&self, connection: &crate::connection::Connection) {
        self.disposed.emit(connection);
    }

    pub(crate) fn emit_error(&self, error: &Error) {
        self.error.emit(error);
    }

    pub(crate) fn emit_message(&self, text: &str) {
        self.message.emit(&text.to_owned());
    }

    pub(crate) fn emit_pong(&self, text: &str) {
        self.pong.emit(&text.to_owned());
    }

    pub(crate) fn emit_log(&self, line: &str) {
        self.log.emit(&line.to_owned());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex as PlMutex;

    #[test]
    fn test_emit_with_no_subscribers_is_noop() {
        let list: HandlerList<String> = HandlerList::new(EventKind::Message);
        list.emit(&"hello".to_owned());
    }

    #[test]
    fn test_invocation_follows_registration_order() {
        let list: HandlerList<()> = HandlerList::new(EventKind::Opened);
        let order = Arc::new(PlMutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            list.subscribe(move |()| order.lock().push(tag));
        }

        list.emit(&());
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_preserves_order_of_rest() {
        let list: HandlerList<()> = HandlerList::new(EventKind::Opened);
        let order = Arc::new(PlMutex::new(Vec::new()));

        let mut subs = Vec::new();
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            subs.push(list.subscribe(move |()| order.lock().push(tag)));
        }

        // Drop the middle subscriber.
        list.unsubscribe(&subs[1]);

        list.emit(&());
        assert_eq!(*order.lock(), vec!["a", "c"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let list: HandlerList<()> = HandlerList::new(EventKind::Closed);
        let sub = list.subscribe(|()| {});

        list.unsubscribe(&sub);
        list.unsubscribe(&sub);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_reentrant_unsubscribe_during_emit() {
        let list: Arc<HandlerList<()>> = Arc::new(HandlerList::new(EventKind::Opened));
        let slot: Arc<PlMutex<Option<Subscription>>> = Arc::new(PlMutex::new(None));
        let fired = Arc::new(AtomicU64::new(0));

        let inner_list = Arc::clone(&list);
        let inner_slot = Arc::clone(&slot);
        let inner_fired = Arc::clone(&fired);
        let sub = list.subscribe(move |()| {
            inner_fired.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = inner_slot.lock().take() {
                inner_list.unsubscribe(&sub);
            }
        });
        *slot.lock() = Some(sub);

        // First emit fires and removes itself; second emit is a no-op.
        list.emit(&());
        list.emit(&());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_reports_kind() {
        let list: HandlerList<()> = HandlerList::new(EventKind::Pong);
        let sub = list.subscribe(|()| {});
        assert_eq!(sub.kind(), EventKind::Pong);
    }
}
