// nestdb-core/src/subscribe.rs
// ============================================================================
// Module: Subscription Registry
// Description: Per-resource subscriber sets feeding SSE clients.
// Purpose: Fan mutations out to subscribers without blocking request tasks.
// Dependencies: parking_lot, tokio
// ============================================================================

//! ## Overview
//! Every collection and document owns a [`SubscriberSet`]. Registering a
//! subscriber yields the receiving half of an ordered, unbounded event
//! queue; producers push update and delete events into every matching
//! queue at notification time. One queue per subscriber keeps updates and
//! deletes in mutation order; a subscriber whose receiver has gone away is
//! pruned at the next notification. Deleting a resource delivers a final
//! delete event and drops the senders, which closes the streams.

// ============================================================================
// SECTION: Imports
// ============================================================================

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event delivered to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberEvent {
    /// A document was created or overwritten; payload is its JSON view.
    Update(String),
    /// A resource was deleted; payload is its request path.
    Delete(String),
}

// ============================================================================
// SECTION: Name Interval
// ============================================================================

/// Inclusive document-name interval recorded at subscribe time.
///
/// Absent bounds are unbounded. Document subscriptions use the unbounded
/// interval; collection subscriptions may restrict delivery to names within
/// `[lo, hi]`.
#[derive(Debug, Clone, Default)]
pub struct NameInterval {
    /// Inclusive lower bound on document names.
    pub lo: Option<String>,
    /// Inclusive upper bound on document names.
    pub hi: Option<String>,
}

impl NameInterval {
    /// The interval matching every name.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            lo: None,
            hi: None,
        }
    }

    /// Returns true when `name` lies within the interval.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lo.as_deref().is_none_or(|lo| lo <= name)
            && self.hi.as_deref().is_none_or(|hi| name <= hi)
    }
}

// ============================================================================
// SECTION: Subscriber Set
// ============================================================================

/// One registered subscriber.
#[derive(Debug)]
struct Subscriber {
    /// Sending half of the subscriber's event queue.
    tx: UnboundedSender<SubscriberEvent>,
    /// Name filter recorded at subscribe time.
    interval: NameInterval,
}

/// The subscribers attached to one collection or document.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    /// Registered subscribers; appends and notification both lock briefly.
    subscribers: RwLock<Vec<Subscriber>>,
}

impl SubscriberSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns both halves of its event queue.
    ///
    /// The sender lets the registrar enqueue the initial snapshot after
    /// registration, so no mutation linearized later can be missed; the
    /// receiver feeds the SSE stream.
    pub fn subscribe(
        &self,
        interval: NameInterval,
    ) -> (UnboundedSender<SubscriberEvent>, UnboundedReceiver<SubscriberEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(Subscriber {
            tx: tx.clone(),
            interval,
        });
        (tx, rx)
    }

    /// Delivers an update for document `name` to every matching subscriber.
    ///
    /// Subscribers whose receiver has been dropped are pruned.
    pub fn notify_update(&self, name: &str, payload: &str) {
        self.subscribers.write().retain(|subscriber| {
            if subscriber.interval.contains(name) {
                subscriber.tx.send(SubscriberEvent::Update(payload.to_string())).is_ok()
            } else {
                !subscriber.tx.is_closed()
            }
        });
    }

    /// Delivers a delete for document `name` to every matching subscriber.
    pub fn notify_delete(&self, name: &str, path: &str) {
        self.subscribers.write().retain(|subscriber| {
            if subscriber.interval.contains(name) {
                subscriber.tx.send(SubscriberEvent::Delete(path.to_string())).is_ok()
            } else {
                !subscriber.tx.is_closed()
            }
        });
    }

    /// Delivers a final delete to every subscriber and closes their queues.
    ///
    /// Called when the owning resource itself is removed from the tree.
    pub fn close(&self, path: &str) {
        let mut subscribers = self.subscribers.write();
        for subscriber in subscribers.iter() {
            let _ = subscriber.tx.send(SubscriberEvent::Delete(path.to_string()));
        }
        subscribers.clear();
    }

    /// Number of live subscribers. Exposed for tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns true when no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}
