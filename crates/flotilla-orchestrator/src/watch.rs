//! Store event bus with selector predicates.
//!
//! Every committed transaction publishes its events to the
//! [`WatchQueue`] in commit order, while the store lock is still held.
//! A subscription installed inside an open transaction therefore
//! observes every event from that transaction's commit onward; nothing
//! can slip between subscribing and committing.
//!
//! Subscribers receive events over an unbounded channel so publication
//! never blocks a commit. Dropping the returned [`WatchHandle`]
//! unsubscribes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use flotilla_core::{NodeId, TaskId};

use crate::node::{Node, NodeState};
use crate::task::{Task, TaskState};

/// A state change committed through the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A task was created.
    TaskCreated(Task),
    /// A task record was replaced.
    TaskUpdated(Task),
    /// A task was deleted.
    TaskDeleted(Task),
    /// A node joined the store.
    NodeCreated(Node),
    /// A node record was replaced.
    NodeUpdated(Node),
    /// A node was removed from the store.
    NodeDeleted(Node),
}

/// Selector predicate applied to events before delivery.
///
/// Filters are combined disjunctively: a subscription with several
/// filters receives every event that matches at least one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Matches a task update for `id` whose observed state has advanced
    /// strictly past `state_above`.
    TaskUpdate {
        /// The task to watch.
        id: TaskId,
        /// Deliver only updates whose observed state exceeds this.
        state_above: TaskState,
    },
    /// Matches a node update for `id` whose observed state equals
    /// `state`.
    NodeUpdate {
        /// The node to watch.
        id: NodeId,
        /// Deliver only updates reporting exactly this state.
        state: NodeState,
    },
    /// Matches the deletion of node `id`.
    NodeDelete {
        /// The node to watch.
        id: NodeId,
    },
}

impl EventFilter {
    /// Returns true if the event satisfies this predicate.
    #[must_use]
    pub fn matches(&self, event: &StoreEvent) -> bool {
        match (self, event) {
            (Self::TaskUpdate { id, state_above }, StoreEvent::TaskUpdated(task)) => {
                task.id == *id && task.status.state > *state_above
            }
            (Self::NodeUpdate { id, state }, StoreEvent::NodeUpdated(node)) => {
                node.id == *id && node.status.state == *state
            }
            (Self::NodeDelete { id }, StoreEvent::NodeDeleted(node)) => node.id == *id,
            _ => false,
        }
    }
}

struct Subscriber {
    filters: Vec<EventFilter>,
    sender: mpsc::UnboundedSender<StoreEvent>,
}

impl Subscriber {
    fn wants(&self, event: &StoreEvent) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(event))
    }
}

/// The store's event bus.
///
/// Held by the store behind an `Arc`; [`MemoryStore::watch_queue`]
/// exposes it so callers can subscribe while a transaction is open.
///
/// [`MemoryStore::watch_queue`]: crate::store::MemoryStore::watch_queue
#[derive(Default)]
pub struct WatchQueue {
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl WatchQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to events matching any of `filters`.
    ///
    /// An empty filter list subscribes to every event. The subscription
    /// lives until the returned [`WatchHandle`] is dropped or
    /// [`WatchHandle::cancel`]led.
    #[must_use]
    pub fn watch(
        self: &Arc<Self>,
        filters: Vec<EventFilter>,
    ) -> (mpsc::UnboundedReceiver<StoreEvent>, WatchHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .insert(id, Subscriber { filters, sender });
        (
            receiver,
            WatchHandle {
                id,
                queue: Arc::downgrade(self),
            },
        )
    }

    /// Delivers `events`, in order, to every interested subscriber.
    ///
    /// Subscribers whose receiver has been dropped are discarded.
    pub(crate) fn publish(&self, events: &[StoreEvent]) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|_, subscriber| {
            for event in events {
                if subscriber.wants(event) && subscriber.sender.send(event.clone()).is_err() {
                    return false;
                }
            }
            true
        });
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }
}

/// Owner token for a subscription; dropping it unsubscribes.
#[derive(Debug)]
pub struct WatchHandle {
    id: u64,
    queue: Weak<WatchQueue>,
}

impl WatchHandle {
    /// Cancels the subscription.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.unsubscribe(self.id);
        }
    }
}
