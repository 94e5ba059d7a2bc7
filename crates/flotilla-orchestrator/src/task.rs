//! Task records and the task state machine.
//!
//! A task is one scheduled instance of a service. Its lifecycle is
//! tracked through two fields: `desired_state`, which the orchestrator
//! writes to steer the agent, and `status.state`, which reports what the
//! agent has observed. Both use the same ordered [`TaskState`] enum:
//!
//! ```text
//! NEW < ALLOCATED < ASSIGNED < READY < STARTING < RUNNING
//!     < COMPLETED < SHUTDOWN < FAILED < REJECTED
//! ```
//!
//! The order matters: "the task is past running" is expressed as
//! `state > TaskState::Running`, and the delay loop promotes a
//! replacement only while `desired_state <= TaskState::Ready`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flotilla_core::{NodeId, ServiceId, TaskId};

use crate::service::{ContainerSpec, Service};

/// Task lifecycle states, ordered by progression.
///
/// Declaration order defines the derived `Ord`; comparisons against
/// [`TaskState::Running`] and [`TaskState::Ready`] drive the supervisor's
/// decisions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Created, not yet through allocation.
    New,
    /// Resources allocated.
    Allocated,
    /// Assigned to a node.
    Assigned,
    /// Accepted by the node, waiting to be told to run.
    Ready,
    /// Agent is starting the task.
    Starting,
    /// Actively running.
    Running,
    /// Exited with a zero status.
    Completed,
    /// Stopped on orchestrator request.
    Shutdown,
    /// Exited with a non-zero status.
    Failed,
    /// The node refused the task.
    Rejected,
}

impl TaskState {
    /// Returns true if a task in this observed state has stopped running
    /// (or never will run).
    #[must_use]
    pub fn past_running(&self) -> bool {
        *self > Self::Running
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Allocated => "allocated",
            Self::Assigned => "assigned",
            Self::Ready => "ready",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Shutdown => "shutdown",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Why a task reached a terminal observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    /// The task exited successfully.
    Completed,
    /// The task exited with an error.
    Failed,
    /// The node rejected the task before it ran.
    Rejected,
}

/// Observed status of a task, reported by the node agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Last observed lifecycle state.
    pub state: TaskState,
    /// Terminal-state reason, set once the task has stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_state: Option<TerminalState>,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self {
            state: TaskState::New,
            terminal_state: None,
        }
    }
}

/// A scheduled instance of a service.
///
/// Tasks are immutable through the store in the sense that a restart
/// replaces the task with a fresh record rather than reviving the old
/// one; the old task is only ever steered toward `SHUTDOWN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: TaskId,
    /// The service this task belongs to.
    pub service_id: ServiceId,
    /// Instance ordinal within the service. Stable across restarts for
    /// replicated services; zero for global services.
    pub slot: u64,
    /// The node this task is assigned to, once scheduled. Global-service
    /// replacements are pinned to the failed task's node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// The state the orchestrator wants the task to converge to.
    pub desired_state: TaskState,
    /// The state the agent has reported.
    pub status: TaskStatus,
    /// Container template cloned from the service spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerSpec>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task from a service template.
    ///
    /// The new task starts unassigned with `desired_state = RUNNING`;
    /// callers that stage the task behind a delay loop lower the desired
    /// state to `READY` before creating it in the store.
    #[must_use]
    pub fn from_service(service: &Service, slot: u64) -> Self {
        Self {
            id: TaskId::generate(),
            service_id: service.id,
            slot,
            node_id: None,
            desired_state: TaskState::Running,
            status: TaskStatus::default(),
            container: service.spec.container.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Service, ServiceMode};

    #[test]
    fn state_order_tracks_lifecycle() {
        assert!(TaskState::New < TaskState::Ready);
        assert!(TaskState::Ready < TaskState::Running);
        assert!(TaskState::Running < TaskState::Completed);
        assert!(TaskState::Completed < TaskState::Shutdown);
        assert!(TaskState::Shutdown < TaskState::Failed);
    }

    #[test]
    fn past_running_covers_all_terminal_states() {
        for state in [
            TaskState::Completed,
            TaskState::Shutdown,
            TaskState::Failed,
            TaskState::Rejected,
        ] {
            assert!(state.past_running(), "{state} should be past running");
        }
        for state in [TaskState::Ready, TaskState::Starting, TaskState::Running] {
            assert!(!state.past_running(), "{state} should not be past running");
        }
    }

    #[test]
    fn from_service_clones_container_template() {
        let service = Service::new("web", ServiceMode::Replicated { replicas: 2 }, None);
        let task = Task::from_service(&service, 1);
        assert_eq!(task.service_id, service.id);
        assert_eq!(task.slot, 1);
        assert_eq!(task.node_id, None);
        assert_eq!(task.desired_state, TaskState::Running);
        assert_eq!(task.status.state, TaskState::New);
    }

    #[test]
    fn status_serde_roundtrip() {
        let status = TaskStatus {
            state: TaskState::Failed,
            terminal_state: Some(TerminalState::Failed),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("FAILED"));
        let back: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, back);
    }
}
