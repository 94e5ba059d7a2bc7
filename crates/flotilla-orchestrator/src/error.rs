//! Error types for the restart supervision domain.

use flotilla_core::{NodeId, TaskId};

/// The result type used throughout flotilla-orchestrator.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store and supervision operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A task was not found in the store.
    #[error("task not found: {task_id}")]
    TaskNotFound {
        /// The task id that was not found.
        task_id: TaskId,
    },

    /// A task with the same id already exists in the store.
    #[error("task already exists: {task_id}")]
    TaskExists {
        /// The conflicting task id.
        task_id: TaskId,
    },

    /// A node was not found in the store.
    #[error("node not found: {node_id}")]
    NodeNotFound {
        /// The node id that was not found.
        node_id: NodeId,
    },

    /// A node with the same id already exists in the store.
    #[error("node already exists: {node_id}")]
    NodeExists {
        /// The conflicting node id.
        node_id: NodeId,
    },

    /// A runtime configuration value was invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the invalid value.
        message: String,
    },

    /// An error from flotilla-core.
    #[error("core error: {0}")]
    Core(#[from] flotilla_core::Error),
}

impl Error {
    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_not_found_display() {
        let task_id = TaskId::generate();
        let err = Error::TaskNotFound { task_id };
        assert!(err.to_string().contains("task not found"));
        assert!(err.to_string().contains(&task_id.to_string()));
    }

    #[test]
    fn configuration_display() {
        let err = Error::configuration("FLOTILLA_X must be positive");
        assert!(err.to_string().contains("configuration error"));
    }
}
