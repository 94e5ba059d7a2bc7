//! # flotilla-orchestrator
//!
//! Restart supervision for the flotilla cluster workload orchestrator.
//!
//! A service's tasks run on cluster nodes; when a task terminates or its
//! node becomes unreachable, the [`RestartSupervisor`] decides whether to
//! create a replacement, when to promote it to RUNNING, and how to keep
//! bursts of failures from turning into unbounded restart loops.
//!
//! ## Core concepts
//!
//! - **Restart decision**: inside the store transaction that observed the
//!   failure, mark the old task for shutdown, consult the restart policy
//!   and the per-instance restart ledger, and create the replacement
//!   task in the `READY` state
//! - **Delay loop**: a per-replacement task that waits out the configured
//!   restart delay, waits for the outgoing task to quiesce (bounded by a
//!   grace timeout), and then commits the `RUNNING` transition
//! - **Restart ledger**: per-instance restart counters with an optional
//!   sliding window bounding how often an instance may be restarted
//!
//! ## Guarantees
//!
//! - At most one active delay loop per replacement task
//! - Event subscriptions are installed before the triggering transaction
//!   commits, so no store event is lost in between
//! - Cancellation is observable in every phase of a delay loop
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use flotilla_orchestrator::restart::RestartSupervisor;
//! use flotilla_orchestrator::service::{RestartCondition, RestartPolicy, Service, ServiceMode};
//! use flotilla_orchestrator::store::MemoryStore;
//! use flotilla_orchestrator::task::Task;
//!
//! # fn main() -> flotilla_orchestrator::error::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let supervisor = RestartSupervisor::new(Arc::clone(&store));
//!
//! let service = Service::new(
//!     "billing",
//!     ServiceMode::Replicated { replicas: 3 },
//!     Some(RestartPolicy {
//!         condition: RestartCondition::OnFailure,
//!         delay: Duration::from_secs(5),
//!         max_attempts: 10,
//!         window: Duration::from_secs(600),
//!     }),
//! );
//! let task = Task::from_service(&service, 1);
//!
//! store.update(|tx| {
//!     tx.create_task(&task)?;
//!     supervisor.restart(tx, &service, &task)
//! })?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod error;
pub mod metrics;
pub mod node;
pub mod restart;
pub mod runtime;
pub mod service;
pub mod store;
pub mod task;
pub mod watch;

pub use restart::RestartSupervisor;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::node::{Node, NodeAvailability, NodeState};
    pub use crate::restart::RestartSupervisor;
    pub use crate::runtime::SupervisorConfig;
    pub use crate::service::{RestartCondition, RestartPolicy, Service, ServiceMode};
    pub use crate::store::{MemoryStore, ReadView, Tx};
    pub use crate::task::{Task, TaskState, TerminalState};
    pub use crate::watch::{EventFilter, StoreEvent, WatchQueue};
}
