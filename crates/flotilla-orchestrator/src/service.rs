//! Service definitions and restart policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use flotilla_core::ServiceId;

/// How a service's tasks are distributed across the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ServiceMode {
    /// A fixed number of independently-numbered tasks. Restarts preserve
    /// the instance slot.
    Replicated {
        /// Desired number of task instances.
        replicas: u64,
    },
    /// One task per node. Restarts preserve the node assignment.
    Global,
}

/// When a terminated task is eligible for a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartCondition {
    /// Restart whenever the task stops, regardless of exit status.
    Any,
    /// Restart only when the task did not complete successfully.
    OnFailure,
    /// Never restart.
    None,
}

/// Restart policy carried on a service spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// Eligibility condition.
    pub condition: RestartCondition,
    /// Delay between a task stopping and its replacement starting.
    pub delay: Duration,
    /// Maximum restart attempts per instance; zero means unlimited.
    pub max_attempts: u64,
    /// Sliding window the attempt cap applies to; zero means the cap is
    /// a lifetime bound.
    pub window: Duration,
}

/// Container template for a service's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container image reference.
    pub image: String,
    /// How long the agent waits for the container to stop before killing
    /// it.
    pub stop_grace_period: Duration,
}

/// User-provided definition of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Human-readable service name.
    pub name: String,
    /// Task distribution mode.
    pub mode: ServiceMode,
    /// Restart policy; absent means restart on any exit with no delay
    /// and no attempt cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartPolicy>,
    /// Container template for the service's tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerSpec>,
}

/// A long-running workload definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Unique service id.
    pub id: ServiceId,
    /// The service definition.
    pub spec: ServiceSpec,
}

impl Service {
    /// Creates a service with a fresh id and no container template.
    #[must_use]
    pub fn new(name: impl Into<String>, mode: ServiceMode, restart: Option<RestartPolicy>) -> Self {
        Self {
            id: ServiceId::generate(),
            spec: ServiceSpec {
                name: name.into(),
                mode,
                restart,
                container: None,
            },
        }
    }

    /// Attaches a container template to the service spec.
    #[must_use]
    pub fn with_container(mut self, container: ContainerSpec) -> Self {
        self.spec.container = Some(container);
        self
    }

    /// Returns true if the service runs a fixed number of replicas.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        matches!(self.spec.mode, ServiceMode::Replicated { .. })
    }

    /// Returns true if the service runs one task per node.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self.spec.mode, ServiceMode::Global)
    }

    /// The effective restart condition; services without a restart
    /// policy restart on any exit.
    #[must_use]
    pub fn restart_condition(&self) -> RestartCondition {
        self.spec
            .restart
            .as_ref()
            .map_or(RestartCondition::Any, |policy| policy.condition)
    }

    /// A lowercase mode label for metrics and logs.
    #[must_use]
    pub const fn mode_label(&self) -> &'static str {
        match self.spec.mode {
            ServiceMode::Replicated { .. } => "replicated",
            ServiceMode::Global => "global",
        }
    }
}
