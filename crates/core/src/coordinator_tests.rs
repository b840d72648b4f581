use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::*;

fn recording_handler(order: Arc<Mutex<Vec<String>>>, agent_id: &str, fails: bool) -> TurnHandler {
    let order = Arc::clone(&order);
    let agent_id = agent_id.to_owned();
    Box::new(move || {
        Box::pin(async move {
            order.lock().push(agent_id.clone());
            if fails {
                Err(CoreError::Handler("boom".to_owned()))
            } else {
                Ok(())
            }
        })
    })
}

#[tokio::test]
async fn submit_runs_handler_and_resolves() {
    let coordinator = TurnCoordinator::new(8);
    let order = Arc::new(Mutex::new(Vec::new()));
    coordinator.submit("agent-a", recording_handler(Arc::clone(&order), "agent-a", false)).await.unwrap();
    assert_eq!(*order.lock(), vec!["agent-a".to_owned()]);
}

#[tokio::test]
async fn submissions_run_in_fifo_order() {
    let coordinator = TurnCoordinator::new(8);
    let order = Arc::new(Mutex::new(Vec::new()));
    let a = coordinator.submit("agent-a", recording_handler(Arc::clone(&order), "agent-a", false));
    let b = coordinator.submit("agent-b", recording_handler(Arc::clone(&order), "agent-b", false));
    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap();
    rb.unwrap();
    assert_eq!(*order.lock(), vec!["agent-a".to_owned(), "agent-b".to_owned()]);
}

#[tokio::test]
async fn handler_error_surfaces_through_submit_without_killing_worker() {
    let coordinator = TurnCoordinator::new(8);
    let order = Arc::new(Mutex::new(Vec::new()));
    let err = coordinator.submit("agent-a", recording_handler(Arc::clone(&order), "agent-a", true)).await.unwrap_err();
    assert_eq!(err.as_str(), "HANDLER");
    coordinator.submit("agent-b", recording_handler(Arc::clone(&order), "agent-b", false)).await.unwrap();
    assert_eq!(*order.lock(), vec!["agent-a".to_owned(), "agent-b".to_owned()]);
}

#[tokio::test]
async fn aclose_rejects_further_submits() {
    let coordinator = TurnCoordinator::new(8);
    coordinator.aclose().await;
    let order = Arc::new(Mutex::new(Vec::new()));
    let err = coordinator.submit("agent-a", recording_handler(order, "agent-a", false)).await.unwrap_err();
    assert_eq!(err.as_str(), "COORDINATOR_CLOSED");
}

#[tokio::test]
async fn next_waiting_agent_excludes_requested_id() {
    let coordinator = Arc::new(TurnCoordinator::new(1));
    let release = Arc::new(tokio::sync::Notify::new());
    let release_clone = Arc::clone(&release);
    let blocker: TurnHandler = Box::new(move || {
        Box::pin(async move {
            release_clone.notified().await;
            Ok(())
        })
    });

    let coordinator_a = Arc::clone(&coordinator);
    let blocked = tokio::spawn(async move { coordinator_a.submit("agent-a", blocker).await });
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let coordinator_b = Arc::clone(&coordinator);
    let queued_handler = recording_handler(order, "agent-b", false);
    let queued = tokio::spawn(async move { coordinator_b.submit("agent-b", queued_handler).await });
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(coordinator.next_waiting_agent(Some("agent-a")), Some("agent-b".to_owned()));
    assert_eq!(coordinator.next_waiting_agent(Some("agent-b")), None);
    assert_eq!(coordinator.next_waiting_agent(None), Some("agent-b".to_owned()));

    release.notify_one();
    let (a, b) = tokio::join!(blocked, queued);
    a.unwrap().unwrap();
    b.unwrap().unwrap();
}

#[test]
fn next_turn_index_is_monotone() {
    let coordinator = TurnCoordinator::new(4);
    assert_eq!(coordinator.next_turn_index(), 0);
    assert_eq!(coordinator.next_turn_index(), 1);
    assert_eq!(coordinator.next_turn_index(), 2);
}
