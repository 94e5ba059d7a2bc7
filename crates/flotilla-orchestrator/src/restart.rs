//! Restart supervision: decide, delay, and promote replacement tasks.
//!
//! [`RestartSupervisor::restart`] runs inside the store transaction that
//! observed a task failure. It marks the failing task for shutdown,
//! consults the restart policy and the per-instance restart ledger, and
//! creates the replacement in the `READY` state. The replacement is then
//! handed to a *delay loop*, an independent spawned task that sequences:
//!
//! ```text
//! NEW ── install subscription ──► DELAYING
//! DELAYING ── delay elapsed / no delay ──► WAITING_STOP or COMMITTING
//! WAITING_STOP ── event | grace timeout ──► COMMITTING
//! any state ── cancel ──► TEARDOWN
//! COMMITTING ── store transaction ──► TEARDOWN
//! TEARDOWN ── unsubscribe, deregister, signal done ──► done
//! ```
//!
//! The quiescence subscription watches for the outgoing task advancing
//! past `RUNNING`, its node going `DOWN`, or its node being deleted; it
//! is installed before the triggering transaction commits, so no store
//! event can be missed in between.
//!
//! The ledger and the delay registry are both guarded by one mutex with
//! short critical sections; the lock is never held across store calls or
//! channel waits.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use flotilla_core::{NodeId, ServiceId, TaskId};

use crate::error::Result;
use crate::metrics::SupervisorMetrics;
use crate::node::{Node, NodeState};
use crate::runtime::SupervisorConfig;
use crate::service::{RestartCondition, Service};
use crate::store::{MemoryStore, Tx};
use crate::task::{Task, TaskState, TerminalState};
use crate::watch::{EventFilter, StoreEvent, WatchHandle};

/// Identity of one service instance across restarts.
///
/// Replicated instances are identified by their slot and carry no node;
/// global instances are one-per-node, so the node carries the identity
/// and the slot is zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceTuple {
    service_id: ServiceId,
    slot: u64,
    node_id: Option<NodeId>,
}

impl InstanceTuple {
    fn for_task(task: &Task, service: &Service) -> Self {
        Self {
            service_id: task.service_id,
            slot: task.slot,
            node_id: if service.is_global() {
                task.node_id
            } else {
                None
            },
        }
    }
}

/// Restart accounting for one instance.
///
/// `window_events` is populated only when the policy carries both a
/// positive attempt cap and a positive window; its length never exceeds
/// `total_restarts` and its timestamps are nondecreasing.
#[derive(Debug, Default)]
struct InstanceRestartInfo {
    total_restarts: u64,
    window_events: VecDeque<DateTime<Utc>>,
}

/// A registered delay loop: cancel requests flow in through `cancel`,
/// completion is observable through `done`. `seq` identifies this
/// registration so a superseded loop's teardown cannot evict its
/// successor's registry entry.
#[derive(Clone)]
struct DelayedStart {
    seq: u64,
    cancel: CancellationToken,
    done: CancellationToken,
}

#[derive(Default)]
struct SupervisorState {
    next_seq: u64,
    delays: HashMap<TaskId, DelayedStart>,
    history: HashMap<InstanceTuple, InstanceRestartInfo>,
    history_by_service: HashMap<ServiceId, HashSet<InstanceTuple>>,
}

/// Initiates and manages task restarts, delaying them when applicable.
pub struct RestartSupervisor {
    store: Arc<MemoryStore>,
    state: Arc<Mutex<SupervisorState>>,
    config: SupervisorConfig,
    metrics: SupervisorMetrics,
}

impl RestartSupervisor {
    /// Creates a supervisor over `store` with default runtime limits.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self::with_config(store, SupervisorConfig::default())
    }

    /// Creates a supervisor with explicit runtime limits.
    #[must_use]
    pub fn with_config(store: Arc<MemoryStore>, config: SupervisorConfig) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(SupervisorState::default())),
            config,
            metrics: SupervisorMetrics::new(),
        }
    }

    /// Initiates a replacement for `task` if the service's restart
    /// policy allows one.
    ///
    /// Must be called inside an open [`MemoryStore::update`] transaction,
    /// from within a Tokio runtime. The failing task is steered to
    /// `SHUTDOWN` unconditionally; policy refusal and unrecognized
    /// service modes return success without creating a replacement.
    ///
    /// # Errors
    ///
    /// Propagates store errors from persisting the shutdown or creating
    /// the replacement; either aborts the caller's transaction.
    pub fn restart(&self, tx: &mut Tx<'_>, service: &Service, task: &Task) -> Result<()> {
        debug_assert_eq!(task.service_id, service.id);

        let mut outgoing = task.clone();
        outgoing.desired_state = TaskState::Shutdown;
        if let Err(err) = tx.update_task(&outgoing) {
            tracing::error!(task_id = %outgoing.id, error = %err, "failed to mark task for shutdown");
            return Err(err);
        }

        let now = Utc::now();
        if !self.should_restart(now, &outgoing, service) {
            return Ok(());
        }

        let mut replacement = if service.is_replicated() {
            Task::from_service(service, outgoing.slot)
        } else if service.is_global() {
            let mut task = Task::from_service(service, 0);
            task.node_id = outgoing.node_id;
            task
        } else {
            tracing::error!(
                service_id = %service.id,
                "service mode not supported by restart supervisor"
            );
            self.metrics.record_denial("unsupported_mode");
            return Ok(());
        };

        let node = outgoing.node_id.and_then(|id| tx.get_node(&id));
        let delay = restart_delay(service, node.as_ref());
        let wait_stop = should_wait_for_stop(&outgoing, node.as_ref());

        replacement.desired_state = TaskState::Ready;
        if let Err(err) = tx.create_task(&replacement) {
            tracing::error!(task_id = %replacement.id, error = %err, "replacement task create failed");
            return Err(err);
        }

        self.record_restart(now, &replacement, service);
        self.metrics.record_restart(service.mode_label());

        self.delay_start(tx, service, Some(&outgoing), replacement.id, delay, wait_stop);
        Ok(())
    }

    /// Registers and spawns the delay loop that will move `task_id` from
    /// `READY` to `RUNNING`.
    ///
    /// Must be called inside an open transaction (the `_tx` parameter is
    /// the proof; nothing is read from it) so the quiescence
    /// subscription is installed before the transaction commits. Any
    /// previously registered loop for `task_id` is cancelled, and the
    /// new loop waits for it to finish tearing down before entering its
    /// delay phase.
    ///
    /// The returned token is the loop's completion signal: it is
    /// cancelled once the loop has unsubscribed and deregistered,
    /// whether it committed or was cancelled.
    pub fn delay_start(
        &self,
        _tx: &Tx<'_>,
        service: &Service,
        old_task: Option<&Task>,
        task_id: TaskId,
        delay: Duration,
        wait_stop: bool,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        let (seq, superseded) = {
            let mut state = self.state.lock();
            state.next_seq += 1;
            let seq = state.next_seq;
            let superseded = state.delays.insert(
                task_id,
                DelayedStart {
                    seq,
                    cancel: cancel.clone(),
                    done: done.clone(),
                },
            );
            self.metrics.set_pending_restarts(state.delays.len());
            (seq, superseded)
        };
        if let Some(previous) = &superseded {
            previous.cancel.cancel();
        }

        // Subscribed while the caller's transaction is still open, so
        // events from its commit onward are guaranteed to be delivered.
        let subscription = if wait_stop {
            old_task.map(|old| {
                let mut filters = vec![EventFilter::TaskUpdate {
                    id: old.id,
                    state_above: TaskState::Running,
                }];
                if let Some(node_id) = old.node_id {
                    filters.push(EventFilter::NodeUpdate {
                        id: node_id,
                        state: NodeState::Down,
                    });
                    filters.push(EventFilter::NodeDelete { id: node_id });
                }
                self.store.watch_queue().watch(filters)
            })
        } else {
            None
        };

        let delay_loop = DelayLoop {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            metrics: self.metrics,
            task_id,
            seq,
            delay,
            quiesce_timeout: self.config.quiesce_timeout(service),
            cancel,
            done: done.clone(),
        };
        tokio::spawn(async move {
            if let Some(previous) = superseded {
                // The superseded loop releases its subscription and
                // registry entry before this one proceeds.
                previous.done.cancelled().await;
            }
            delay_loop.run(subscription).await;
        });

        done
    }

    /// Moves a delayed task to `RUNNING` so it will proceed to start up.
    ///
    /// A task that no longer exists, or whose desired state has already
    /// advanced past `READY`, is left alone.
    ///
    /// # Errors
    ///
    /// Returns store errors from persisting the update, unchanged.
    pub fn start_now(tx: &mut Tx<'_>, task_id: TaskId) -> Result<()> {
        let Some(mut task) = tx.get_task(&task_id) else {
            return Ok(());
        };
        if task.desired_state > TaskState::Ready {
            return Ok(());
        }
        task.desired_state = TaskState::Running;
        tx.update_task(&task)
    }

    /// Cancels the pending restart for `task_id`, if any, and waits for
    /// its delay loop to finish tearing down.
    pub async fn cancel(&self, task_id: TaskId) {
        let handle = {
            let state = self.state.lock();
            state
                .delays
                .get(&task_id)
                .map(|delayed| (delayed.cancel.clone(), delayed.done.clone()))
        };
        let Some((cancel, done)) = handle else {
            return;
        };
        cancel.cancel();
        done.cancelled().await;
    }

    /// Cancels every pending restart and waits for all of their delay
    /// loops to finish tearing down. The registry is empty afterwards.
    pub async fn cancel_all(&self) {
        let handles: Vec<DelayedStart> = {
            let state = self.state.lock();
            state.delays.values().cloned().collect()
        };
        for handle in &handles {
            handle.cancel.cancel();
        }
        for handle in handles {
            handle.done.cancelled().await;
        }
    }

    /// Forgets all restart history recorded for `service_id`. Idempotent
    /// for unknown ids.
    pub fn clear_service_history(&self, service_id: ServiceId) {
        let mut state = self.state.lock();
        let Some(tuples) = state.history_by_service.remove(&service_id) else {
            return;
        };
        for tuple in tuples {
            state.history.remove(&tuple);
        }
    }

    /// Number of delay loops currently registered.
    #[must_use]
    pub fn pending_restarts(&self) -> usize {
        self.state.lock().delays.len()
    }

    fn should_restart(&self, now: DateTime<Utc>, task: &Task, service: &Service) -> bool {
        match service.restart_condition() {
            RestartCondition::None => {
                self.metrics.record_denial("condition");
                return false;
            }
            RestartCondition::OnFailure
                if task.status.terminal_state == Some(TerminalState::Completed) =>
            {
                self.metrics.record_denial("condition");
                return false;
            }
            RestartCondition::Any | RestartCondition::OnFailure => {}
        }

        let Some(policy) = service.spec.restart.as_ref() else {
            return true;
        };
        if policy.max_attempts == 0 {
            return true;
        }

        let tuple = InstanceTuple::for_task(task, service);
        let mut state = self.state.lock();
        let Some(info) = state.history.get_mut(&tuple) else {
            // First restart for this instance.
            return true;
        };

        let restarts_counted = if policy.window.is_zero() {
            info.total_restarts
        } else {
            // Prune events that have aged out of the window; an event
            // exactly at the lookback boundary is outside the window.
            let lookback = chrono::Duration::from_std(policy.window)
                .ok()
                .and_then(|window| now.checked_sub_signed(window));
            if let Some(lookback) = lookback {
                while let Some(&timestamp) = info.window_events.front() {
                    if timestamp > lookback {
                        break;
                    }
                    info.window_events.pop_front();
                }
            }
            u64::try_from(info.window_events.len()).unwrap_or(u64::MAX)
        };

        if restarts_counted < policy.max_attempts {
            return true;
        }
        drop(state);
        self.metrics.record_denial("attempts");
        false
    }

    fn record_restart(&self, now: DateTime<Utc>, replacement: &Task, service: &Service) {
        let Some(policy) = service.spec.restart.as_ref() else {
            return;
        };
        if policy.max_attempts == 0 {
            // No attempt cap, so no accounting is needed.
            return;
        }

        let tuple = InstanceTuple::for_task(replacement, service);
        let mut state = self.state.lock();
        let state = &mut *state;

        let info = state.history.entry(tuple.clone()).or_default();
        info.total_restarts += 1;
        if !policy.window.is_zero() {
            info.window_events.push_back(now);
        }

        state
            .history_by_service
            .entry(replacement.service_id)
            .or_default()
            .insert(tuple);
    }
}

/// One spawned delay loop.
struct DelayLoop {
    store: Arc<MemoryStore>,
    state: Arc<Mutex<SupervisorState>>,
    metrics: SupervisorMetrics,
    task_id: TaskId,
    seq: u64,
    delay: Duration,
    quiesce_timeout: Duration,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl DelayLoop {
    async fn run(self, subscription: Option<(UnboundedReceiver<StoreEvent>, WatchHandle)>) {
        let (receiver, watch_handle) = match subscription {
            Some((receiver, handle)) => (Some(receiver), Some(handle)),
            None => (None, None),
        };

        let committed = self.wait_out(receiver).await;
        if committed {
            let task_id = self.task_id;
            let result = self.store.update(|tx| {
                if let Err(err) = RestartSupervisor::start_now(tx, task_id) {
                    tracing::error!(
                        task_id = %task_id,
                        error = %err,
                        "moving task out of delayed state failed"
                    );
                }
                Ok(())
            });
            if let Err(err) = result {
                tracing::error!(task_id = %self.task_id, error = %err, "task restart transaction failed");
            }
        }

        // Teardown runs on every exit path: unsubscribe, deregister,
        // then signal completion.
        drop(watch_handle);
        {
            let mut state = self.state.lock();
            if state
                .delays
                .get(&self.task_id)
                .is_some_and(|delayed| delayed.seq == self.seq)
            {
                state.delays.remove(&self.task_id);
            }
            self.metrics.set_pending_restarts(state.delays.len());
        }
        self.metrics
            .record_delay_loop(if committed { "committed" } else { "cancelled" });
        self.done.cancel();
    }

    /// Waits out the restart delay and then the outgoing task's
    /// quiescence. Returns false if cancelled.
    async fn wait_out(&self, mut receiver: Option<UnboundedReceiver<StoreEvent>>) -> bool {
        // Armed before the delay phase: the grace period spans both
        // waits, matching the clock the agent is stopping against.
        let quiesce_deadline = tokio::time::sleep(self.quiesce_timeout);
        tokio::pin!(quiesce_deadline);

        if !self.delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = self.cancel.cancelled() => return false,
            }
        }

        if let Some(receiver) = receiver.as_mut() {
            tokio::select! {
                _ = receiver.recv() => {}
                () = &mut quiesce_deadline => {}
                () = self.cancel.cancelled() => return false,
            }
        }

        true
    }
}

/// The effective restart delay: the policy's delay, except that drained
/// nodes restart immediately.
fn restart_delay(service: &Service, node: Option<&Node>) -> Duration {
    match service.spec.restart.as_ref() {
        Some(policy) if !policy.delay.is_zero() && !node.is_some_and(Node::is_draining) => {
            policy.delay
        }
        _ => Duration::ZERO,
    }
}

/// Whether the delay loop should wait for the outgoing task to stop
/// running. Not worth waiting for when the node is already down or the
/// task is already past running.
fn should_wait_for_stop(task: &Task, node: Option<&Node>) -> bool {
    !(node.is_some_and(Node::is_down) || task.status.state.past_running())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeAvailability;
    use crate::service::{RestartPolicy, ServiceMode};

    fn policy(condition: RestartCondition, max_attempts: u64, window: Duration) -> RestartPolicy {
        RestartPolicy {
            condition,
            delay: Duration::ZERO,
            max_attempts,
            window,
        }
    }

    fn replicated_service(restart: Option<RestartPolicy>) -> Service {
        Service::new("web", ServiceMode::Replicated { replicas: 1 }, restart)
    }

    fn supervisor() -> RestartSupervisor {
        RestartSupervisor::new(Arc::new(MemoryStore::new()))
    }

    fn failed_task(service: &Service, slot: u64) -> Task {
        let mut task = Task::from_service(service, slot);
        task.status.state = TaskState::Failed;
        task.status.terminal_state = Some(TerminalState::Failed);
        task
    }

    #[test]
    fn condition_none_always_refuses() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(RestartCondition::None, 0, Duration::ZERO)));
        let task = failed_task(&service, 1);
        assert!(!sup.should_restart(Utc::now(), &task, &service));
    }

    #[test]
    fn on_failure_refuses_completed_tasks() {
        let sup = supervisor();
        let service =
            replicated_service(Some(policy(RestartCondition::OnFailure, 0, Duration::ZERO)));

        let mut completed = failed_task(&service, 1);
        completed.status.state = TaskState::Completed;
        completed.status.terminal_state = Some(TerminalState::Completed);
        assert!(!sup.should_restart(Utc::now(), &completed, &service));

        let failed = failed_task(&service, 1);
        assert!(sup.should_restart(Utc::now(), &failed, &service));
    }

    #[test]
    fn no_policy_restarts_on_any_exit() {
        let sup = supervisor();
        let service = replicated_service(None);
        let task = failed_task(&service, 1);
        assert!(sup.should_restart(Utc::now(), &task, &service));
    }

    #[test]
    fn unlimited_attempts_skip_accounting() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(RestartCondition::Any, 0, Duration::ZERO)));
        let task = failed_task(&service, 1);

        sup.record_restart(Utc::now(), &task, &service);
        assert!(sup.state.lock().history.is_empty());
        assert!(sup.should_restart(Utc::now(), &task, &service));
    }

    #[test]
    fn ledger_counts_restarts_and_window_events() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(
            RestartCondition::Any,
            5,
            Duration::from_secs(60),
        )));
        let task = failed_task(&service, 1);
        let now = Utc::now();

        for i in 0..3 {
            sup.record_restart(now + chrono::Duration::seconds(i), &task, &service);
        }

        let state = sup.state.lock();
        let tuple = InstanceTuple::for_task(&task, &service);
        let info = state.history.get(&tuple).expect("ledger entry");
        assert_eq!(info.total_restarts, 3);
        assert_eq!(info.window_events.len(), 3);
        assert!(state.history_by_service[&service.id].contains(&tuple));
    }

    #[test]
    fn lifetime_bound_refuses_after_max_attempts() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(RestartCondition::Any, 2, Duration::ZERO)));
        let task = failed_task(&service, 1);
        let now = Utc::now();

        assert!(sup.should_restart(now, &task, &service));
        sup.record_restart(now, &task, &service);
        assert!(sup.should_restart(now, &task, &service));
        sup.record_restart(now, &task, &service);
        assert!(!sup.should_restart(now, &task, &service));
    }

    #[test]
    fn window_refuses_while_full_and_allows_after_slide() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(
            RestartCondition::Any,
            2,
            Duration::from_secs(10),
        )));
        let task = failed_task(&service, 1);
        let start = Utc::now();

        sup.record_restart(start, &task, &service);
        sup.record_restart(start + chrono::Duration::seconds(5), &task, &service);

        // Both events inside the window: refused.
        assert!(!sup.should_restart(start + chrono::Duration::seconds(8), &task, &service));

        // At t=12 the t=0 event has aged out.
        assert!(sup.should_restart(start + chrono::Duration::seconds(12), &task, &service));
    }

    #[test]
    fn event_exactly_at_lookback_boundary_is_pruned() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(
            RestartCondition::Any,
            1,
            Duration::from_secs(10),
        )));
        let task = failed_task(&service, 1);
        let start = Utc::now();

        sup.record_restart(start, &task, &service);
        assert!(sup.should_restart(start + chrono::Duration::seconds(10), &task, &service));
    }

    #[test]
    fn pruning_is_idempotent_and_keeps_totals() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(
            RestartCondition::Any,
            2,
            Duration::from_secs(10),
        )));
        let task = failed_task(&service, 1);
        let start = Utc::now();

        sup.record_restart(start, &task, &service);
        sup.record_restart(start + chrono::Duration::seconds(5), &task, &service);

        let now = start + chrono::Duration::seconds(12);
        let first = sup.should_restart(now, &task, &service);
        let second = sup.should_restart(now, &task, &service);
        assert_eq!(first, second);

        let state = sup.state.lock();
        let info = &state.history[&InstanceTuple::for_task(&task, &service)];
        assert_eq!(info.total_restarts, 2);
        assert_eq!(info.window_events.len(), 1);
    }

    #[test]
    fn global_instances_are_keyed_by_node() {
        let service = Service::new(
            "agent",
            ServiceMode::Global,
            Some(policy(RestartCondition::Any, 1, Duration::ZERO)),
        );
        let node_id = NodeId::generate();
        let mut task = Task::from_service(&service, 0);
        task.node_id = Some(node_id);

        let tuple = InstanceTuple::for_task(&task, &service);
        assert_eq!(tuple.node_id, Some(node_id));
        assert_eq!(tuple.slot, 0);
    }

    #[test]
    fn replicated_instances_ignore_node_assignment() {
        let service = replicated_service(Some(policy(RestartCondition::Any, 1, Duration::ZERO)));
        let mut task = Task::from_service(&service, 3);
        task.node_id = Some(NodeId::generate());

        let tuple = InstanceTuple::for_task(&task, &service);
        assert_eq!(tuple.node_id, None);
        assert_eq!(tuple.slot, 3);
    }

    #[test]
    fn drained_node_suppresses_restart_delay() {
        let service = replicated_service(Some(RestartPolicy {
            condition: RestartCondition::Any,
            delay: Duration::from_secs(5),
            max_attempts: 0,
            window: Duration::ZERO,
        }));

        let drained = Node::new(NodeAvailability::Drain, NodeState::Up);
        assert_eq!(restart_delay(&service, Some(&drained)), Duration::ZERO);

        let active = Node::new(NodeAvailability::Active, NodeState::Up);
        assert_eq!(
            restart_delay(&service, Some(&active)),
            Duration::from_secs(5)
        );
        assert_eq!(restart_delay(&service, None), Duration::from_secs(5));

        // DOWN is not DRAIN; the delay still applies.
        let down = Node::new(NodeAvailability::Active, NodeState::Down);
        assert_eq!(restart_delay(&service, Some(&down)), Duration::from_secs(5));
    }

    #[test]
    fn wait_for_stop_skipped_for_down_nodes_and_stopped_tasks() {
        let service = replicated_service(None);
        let running = {
            let mut task = Task::from_service(&service, 1);
            task.status.state = TaskState::Running;
            task
        };

        let up = Node::new(NodeAvailability::Active, NodeState::Up);
        assert!(should_wait_for_stop(&running, Some(&up)));
        assert!(should_wait_for_stop(&running, None));

        let down = Node::new(NodeAvailability::Active, NodeState::Down);
        assert!(!should_wait_for_stop(&running, Some(&down)));

        let stopped = failed_task(&service, 1);
        assert!(!should_wait_for_stop(&stopped, Some(&up)));
    }

    #[test]
    fn clear_service_history_purges_ledger_and_index() {
        let sup = supervisor();
        let service = replicated_service(Some(policy(RestartCondition::Any, 5, Duration::ZERO)));
        let other = replicated_service(Some(policy(RestartCondition::Any, 5, Duration::ZERO)));
        let now = Utc::now();

        sup.record_restart(now, &failed_task(&service, 1), &service);
        sup.record_restart(now, &failed_task(&service, 2), &service);
        sup.record_restart(now, &failed_task(&other, 1), &other);

        sup.clear_service_history(service.id);
        // Clearing again is a no-op.
        sup.clear_service_history(service.id);

        let state = sup.state.lock();
        assert!(!state.history_by_service.contains_key(&service.id));
        assert!(state.history.keys().all(|t| t.service_id != service.id));
        assert!(state.history_by_service.contains_key(&other.id));
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn start_now_promotes_only_delayed_tasks() -> Result<()> {
        let store = MemoryStore::new();
        let service = replicated_service(None);

        let mut ready = Task::from_service(&service, 1);
        ready.desired_state = TaskState::Ready;
        let mut shutting_down = Task::from_service(&service, 2);
        shutting_down.desired_state = TaskState::Shutdown;

        store.update(|tx| {
            tx.create_task(&ready)?;
            tx.create_task(&shutting_down)
        })?;

        store.update(|tx| {
            RestartSupervisor::start_now(tx, ready.id)?;
            RestartSupervisor::start_now(tx, shutting_down.id)?;
            // Unknown ids are ignored.
            RestartSupervisor::start_now(tx, TaskId::generate())
        })?;

        store.view(|view| {
            assert_eq!(
                view.get_task(&ready.id).map(|t| t.desired_state),
                Some(TaskState::Running)
            );
            assert_eq!(
                view.get_task(&shutting_down.id).map(|t| t.desired_state),
                Some(TaskState::Shutdown)
            );
        });
        Ok(())
    }
}
