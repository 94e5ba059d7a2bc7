//! Cluster node records.
//!
//! The supervisor reads nodes, never writes them: node state decides
//! whether a restart waits for the outgoing task to quiesce, and node
//! availability decides whether the restart delay applies.

use serde::{Deserialize, Serialize};

use flotilla_core::NodeId;

/// Health of a node as reported by the cluster membership layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// No heartbeat has been evaluated yet.
    Unknown,
    /// The node has missed its heartbeat deadline.
    Down,
    /// The node is healthy.
    Up,
    /// The node disconnected and has not yet been declared down.
    Disconnected,
}

/// Operator-controlled scheduling availability of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAvailability {
    /// New tasks may be scheduled onto the node.
    Active,
    /// Existing tasks keep running, no new tasks are scheduled.
    Pause,
    /// Tasks are being evacuated from the node.
    Drain,
}

/// Operator-provided node settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Scheduling availability.
    pub availability: NodeAvailability,
}

/// Observed node status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Last observed health state.
    pub state: NodeState,
}

/// A member of the cluster that tasks are scheduled onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id.
    pub id: NodeId,
    /// Operator settings.
    pub spec: NodeSpec,
    /// Observed status.
    pub status: NodeStatus,
}

impl Node {
    /// Creates a node with a fresh id.
    #[must_use]
    pub fn new(availability: NodeAvailability, state: NodeState) -> Self {
        Self {
            id: NodeId::generate(),
            spec: NodeSpec { availability },
            status: NodeStatus { state },
        }
    }

    /// Returns true if the node has been declared down.
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.status.state == NodeState::Down
    }

    /// Returns true if the node is being drained.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.spec.availability == NodeAvailability::Drain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        let node = Node::new(NodeAvailability::Drain, NodeState::Up);
        assert!(node.is_draining());
        assert!(!node.is_down());

        let node = Node::new(NodeAvailability::Active, NodeState::Down);
        assert!(node.is_down());
        assert!(!node.is_draining());
    }
}
