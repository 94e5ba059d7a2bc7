//! In-memory implementation of the transactional store.
//!
//! State lives in two hash maps behind one mutex. Transactions stage
//! their writes in a scratch overlay; commit applies the overlay and
//! publishes events while the store lock is still held, so a watch
//! subscription installed inside a transaction observes every event
//! from that commit onward.
//!
//! ## Limitations
//!
//! - **Single-process only**: no durability, no replication
//! - **Serialized writers**: one transaction at a time

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use flotilla_core::{NodeId, TaskId};

use crate::error::{Error, Result};
use crate::node::Node;
use crate::task::Task;
use crate::watch::{StoreEvent, WatchQueue};

#[derive(Default)]
struct StoreState {
    tasks: HashMap<TaskId, Task>,
    nodes: HashMap<NodeId, Node>,
}

/// Thread-safe in-memory store over task and node records.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    queue: Arc<WatchQueue>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store's event bus, for installing watch subscriptions.
    #[must_use]
    pub fn watch_queue(&self) -> Arc<WatchQueue> {
        Arc::clone(&self.queue)
    }

    /// Runs `f` inside a read-write transaction.
    ///
    /// Writes are staged and become visible to other callers only after
    /// `f` returns `Ok`; the transaction's events are then published in
    /// commit order before the store lock is released. If `f` returns an
    /// error, every staged write and event is discarded and the error is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<()>,
    {
        let mut state = self.state.lock();
        let mut tx = Tx::new(&state);
        f(&mut tx)?;
        let (tasks, nodes, events) = tx.into_parts();

        for (id, slot) in tasks {
            match slot {
                Some(task) => {
                    state.tasks.insert(id, task);
                }
                None => {
                    state.tasks.remove(&id);
                }
            }
        }
        for (id, slot) in nodes {
            match slot {
                Some(node) => {
                    state.nodes.insert(id, node);
                }
                None => {
                    state.nodes.remove(&id);
                }
            }
        }

        // Publish before releasing the lock: subscribers see commits in
        // the same order writers applied them.
        self.queue.publish(&events);
        Ok(())
    }

    /// Runs `f` against a read-only view of the current state.
    pub fn view<R>(&self, f: impl FnOnce(&ReadView<'_>) -> R) -> R {
        let state = self.state.lock();
        f(&ReadView { state: &state })
    }
}

/// A read-write transaction handle.
///
/// All reads see the transaction's own staged writes.
pub struct Tx<'a> {
    base: &'a StoreState,
    tasks: HashMap<TaskId, Option<Task>>,
    nodes: HashMap<NodeId, Option<Node>>,
    events: Vec<StoreEvent>,
}

impl<'a> Tx<'a> {
    fn new(base: &'a StoreState) -> Self {
        Self {
            base,
            tasks: HashMap::new(),
            nodes: HashMap::new(),
            events: Vec::new(),
        }
    }

    fn into_parts(
        self,
    ) -> (
        HashMap<TaskId, Option<Task>>,
        HashMap<NodeId, Option<Node>>,
        Vec<StoreEvent>,
    ) {
        (self.tasks, self.nodes, self.events)
    }

    /// Fetches a task by id.
    #[must_use]
    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        match self.tasks.get(id) {
            Some(slot) => slot.clone(),
            None => self.base.tasks.get(id).cloned(),
        }
    }

    fn task_exists(&self, id: &TaskId) -> bool {
        match self.tasks.get(id) {
            Some(slot) => slot.is_some(),
            None => self.base.tasks.contains_key(id),
        }
    }

    /// Creates a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskExists`] if a task with this id already
    /// exists.
    pub fn create_task(&mut self, task: &Task) -> Result<()> {
        if self.task_exists(&task.id) {
            return Err(Error::TaskExists { task_id: task.id });
        }
        self.tasks.insert(task.id, Some(task.clone()));
        self.events.push(StoreEvent::TaskCreated(task.clone()));
        Ok(())
    }

    /// Replaces an existing task record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] if no task with this id exists.
    pub fn update_task(&mut self, task: &Task) -> Result<()> {
        if !self.task_exists(&task.id) {
            return Err(Error::TaskNotFound { task_id: task.id });
        }
        self.tasks.insert(task.id, Some(task.clone()));
        self.events.push(StoreEvent::TaskUpdated(task.clone()));
        Ok(())
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] if no task with this id exists.
    pub fn delete_task(&mut self, id: &TaskId) -> Result<()> {
        let Some(task) = self.get_task(id) else {
            return Err(Error::TaskNotFound { task_id: *id });
        };
        self.tasks.insert(*id, None);
        self.events.push(StoreEvent::TaskDeleted(task));
        Ok(())
    }

    /// Fetches a node by id.
    #[must_use]
    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        match self.nodes.get(id) {
            Some(slot) => slot.clone(),
            None => self.base.nodes.get(id).cloned(),
        }
    }

    fn node_exists(&self, id: &NodeId) -> bool {
        match self.nodes.get(id) {
            Some(slot) => slot.is_some(),
            None => self.base.nodes.contains_key(id),
        }
    }

    /// Creates a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeExists`] if a node with this id already
    /// exists.
    pub fn create_node(&mut self, node: &Node) -> Result<()> {
        if self.node_exists(&node.id) {
            return Err(Error::NodeExists { node_id: node.id });
        }
        self.nodes.insert(node.id, Some(node.clone()));
        self.events.push(StoreEvent::NodeCreated(node.clone()));
        Ok(())
    }

    /// Replaces an existing node record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if no node with this id exists.
    pub fn update_node(&mut self, node: &Node) -> Result<()> {
        if !self.node_exists(&node.id) {
            return Err(Error::NodeNotFound { node_id: node.id });
        }
        self.nodes.insert(node.id, Some(node.clone()));
        self.events.push(StoreEvent::NodeUpdated(node.clone()));
        Ok(())
    }

    /// Deletes a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if no node with this id exists.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<()> {
        let Some(node) = self.get_node(id) else {
            return Err(Error::NodeNotFound { node_id: *id });
        };
        self.nodes.insert(*id, None);
        self.events.push(StoreEvent::NodeDeleted(node));
        Ok(())
    }
}

/// A read-only view of committed state.
pub struct ReadView<'a> {
    state: &'a StoreState,
}

impl ReadView<'_> {
    /// Fetches a task by id.
    #[must_use]
    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.state.tasks.get(id).cloned()
    }

    /// Fetches a node by id.
    #[must_use]
    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.state.nodes.get(id).cloned()
    }

    /// All tasks currently in the store.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.tasks.values().cloned().collect()
    }

    /// Number of tasks currently in the store.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.state.tasks.len()
    }
}
