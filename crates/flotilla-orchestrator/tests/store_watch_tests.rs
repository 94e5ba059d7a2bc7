//! Store transaction and watch ordering guarantees.

use std::sync::Arc;
use std::time::Duration;

use flotilla_orchestrator::error::Result;
use flotilla_orchestrator::service::{Service, ServiceMode};
use flotilla_orchestrator::store::MemoryStore;
use flotilla_orchestrator::task::{Task, TaskState};
use flotilla_orchestrator::watch::{EventFilter, StoreEvent};

fn test_task(service: &Service, slot: u64) -> Task {
    Task::from_service(service, slot)
}

#[tokio::test]
async fn subscription_installed_inside_transaction_misses_nothing() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = Service::new("web", ServiceMode::Replicated { replicas: 1 }, None);
    let task = test_task(&service, 1);
    store.update(|tx| tx.create_task(&task))?;

    // Subscribe mid-transaction, then commit a matching event in the
    // same transaction: the subscriber must see it.
    let mut subscription = None;
    store.update(|tx| {
        subscription = Some(store.watch_queue().watch(vec![EventFilter::TaskUpdate {
            id: task.id,
            state_above: TaskState::Running,
        }]));
        let mut failed = tx.get_task(&task.id).expect("task");
        failed.status.state = TaskState::Failed;
        tx.update_task(&failed)
    })?;

    let (mut receiver, _handle) = subscription.expect("subscription installed");
    let event = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("event delivered")
        .expect("channel open");
    match event {
        StoreEvent::TaskUpdated(updated) => {
            assert_eq!(updated.id, task.id);
            assert_eq!(updated.status.state, TaskState::Failed);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn events_from_sequential_transactions_arrive_in_commit_order() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = Service::new("web", ServiceMode::Replicated { replicas: 1 }, None);
    let task = test_task(&service, 1);
    store.update(|tx| tx.create_task(&task))?;

    let (mut receiver, _handle) = store.watch_queue().watch(vec![]);

    for state in [TaskState::Starting, TaskState::Running, TaskState::Failed] {
        store.update(|tx| {
            let mut updated = tx.get_task(&task.id).expect("task");
            updated.status.state = state;
            tx.update_task(&updated)
        })?;
    }

    let mut observed = Vec::new();
    for _ in 0..3 {
        match receiver.recv().await.expect("event") {
            StoreEvent::TaskUpdated(updated) => observed.push(updated.status.state),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(
        observed,
        vec![TaskState::Starting, TaskState::Running, TaskState::Failed]
    );
    Ok(())
}

#[tokio::test]
async fn aborted_transaction_publishes_no_events() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = Service::new("web", ServiceMode::Replicated { replicas: 1 }, None);
    let task = test_task(&service, 1);

    let (mut receiver, _handle) = store.watch_queue().watch(vec![]);

    let phantom = test_task(&service, 2);
    let result = store.update(|tx| {
        tx.create_task(&task)?;
        // Fails: phantom was never created.
        tx.update_task(&phantom)
    });
    assert!(result.is_err());

    assert_eq!(store.view(|v| v.task_count()), 0);
    assert!(receiver.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn concurrent_writers_serialize_cleanly() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(Service::new(
        "bulk",
        ServiceMode::Replicated { replicas: 64 },
        None,
    ));

    let mut writers = Vec::new();
    for worker in 0..8u64 {
        let store = Arc::clone(&store);
        let service = Arc::clone(&service);
        writers.push(tokio::spawn(async move {
            for i in 0..8u64 {
                let task = test_task(&service, worker * 8 + i);
                store
                    .update(|tx| tx.create_task(&task))
                    .expect("create succeeds");
            }
        }));
    }
    for writer in writers {
        writer.await.expect("writer finished");
    }

    assert_eq!(store.view(|v| v.task_count()), 64);
    Ok(())
}
