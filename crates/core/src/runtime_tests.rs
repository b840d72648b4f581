use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::llm::{register_default_clients, LlmProvider};
use crate::telemetry::NullSink;

fn profile(agent_id: &str) -> AgentProfile {
    AgentProfile {
        agent_id: agent_id.to_owned(),
        display_name: agent_id.to_owned(),
        archetype: "tester".to_owned(),
        summary: "fixture".to_owned(),
        goals: vec![],
        traits: vec![],
    }
}

fn session_config(agent_id: &str) -> LlmSessionConfig {
    LlmSessionConfig {
        provider: LlmProvider::Mock,
        model: format!("mock-{agent_id}"),
        system_prompt: "be brief".to_owned(),
        temperature: 0.7,
        top_p: 0.9,
        max_output_tokens: None,
        metadata: Default::default(),
    }
}

fn mock_runtime() -> Arc<Runtime> {
    let mut registry = ClientRegistry::new();
    register_default_clients(&mut registry);
    Runtime::new(registry, Arc::new(Recorder::new(Arc::new(NullSink))))
}

fn counting_handler(count: Arc<AtomicU32>) -> TickHandler {
    Arc::new(move |_handle: AgentHandle, _event: TimerEvent| {
        let count = Arc::clone(&count);
        Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    })
}

#[tokio::test]
async fn spawn_agent_registers_bus_bucket_and_emits_event() {
    let runtime = mock_runtime();
    runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    let events = runtime.recorder().events();
    assert!(events.iter().any(|e| e.event == "agent.spawned"));
    assert!(runtime.bus().fetch_broadcasts("z", &["a".to_owned()], 10).is_empty());
}

#[tokio::test]
async fn spawn_agent_fails_for_unknown_provider() {
    let runtime = mock_runtime();
    let mut config = session_config("a");
    config.provider = LlmProvider::Anthropic;
    let err = runtime.spawn_agent(profile("a"), config, None).await.unwrap_err();
    assert_eq!(err.as_str(), "UNKNOWN_PROVIDER");
}

#[tokio::test(start_paused = true)]
async fn countdown_ticks_until_terminal_and_marks_agent_dead() {
    let runtime = mock_runtime();
    let handle = runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    let count = Arc::new(AtomicU32::new(0));

    runtime
        .start_countdown("a", Duration::from_millis(150), 0.05, 0.05, 0, counting_handler(Arc::clone(&count)))
        .unwrap();

    tokio::time::advance(Duration::from_millis(500)).await;
    runtime.shutdown().await;

    assert!(count.load(Ordering::SeqCst) >= 2);
    let events = runtime.recorder().events();
    assert!(events.iter().any(|e| e.event == "timer.expired"));
    assert_eq!(handle.lock().await.status, crate::model::LifecycleStatus::Expired);
}

#[tokio::test]
async fn peer_diary_messages_suppresses_unchanged_repeat_fetch() {
    let runtime = mock_runtime();
    runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    runtime.spawn_agent(profile("b"), session_config("b"), None).await.unwrap();
    runtime.bus().publish_broadcast("b", "hello peers");

    let owners = vec!["a".to_owned(), "b".to_owned()];
    let first = runtime.peer_diary_messages("a", &owners, 10);
    let second = runtime.peer_diary_messages("a", &owners, 10);

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[tokio::test]
async fn peer_diary_messages_refires_after_new_broadcast() {
    let runtime = mock_runtime();
    runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    runtime.spawn_agent(profile("b"), session_config("b"), None).await.unwrap();
    runtime.bus().publish_broadcast("b", "first");

    let owners = vec!["a".to_owned(), "b".to_owned()];
    assert_eq!(runtime.peer_diary_messages("a", &owners, 10).len(), 1);
    assert!(runtime.peer_diary_messages("a", &owners, 10).is_empty());

    runtime.bus().publish_broadcast("b", "second");
    assert_eq!(runtime.peer_diary_messages("a", &owners, 10).len(), 1);
}

#[tokio::test]
async fn peer_timer_snapshot_excludes_requested_agent() {
    let runtime = mock_runtime();
    runtime.last_ms_left.write().insert("a".to_owned(), 100);
    runtime.last_ms_left.write().insert("b".to_owned(), 200);
    let snapshot = runtime.peer_timer_snapshot(Some("a"));
    assert_eq!(snapshot.get("a"), None);
    assert_eq!(snapshot.get("b"), Some(&200));
}

#[tokio::test]
async fn respawn_agent_bumps_life_and_emits_event() {
    let runtime = mock_runtime();
    let handle = runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    handle.lock().await.mark_dead();

    runtime.respawn_agent("a").await.unwrap();

    let state = handle.lock().await;
    assert_eq!(state.status, crate::model::LifecycleStatus::Alive);
    assert_eq!(state.memory.life_index, 1);
    drop(state);

    let events = runtime.recorder().events();
    assert!(events.iter().any(|e| e.event == "agent.respawn" && e.payload["life_index"] == 1));
}

#[tokio::test]
async fn respawn_agent_fails_for_unknown_agent() {
    let runtime = mock_runtime();
    let err = runtime.respawn_agent("ghost").await.unwrap_err();
    assert_eq!(err.as_str(), "HANDLER");
}

#[tokio::test(start_paused = true)]
async fn turn_gating_is_live_during_a_real_tick() {
    let runtime = mock_runtime();
    runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    runtime.spawn_agent(profile("b"), session_config("b"), None).await.unwrap();

    let other_accepted = Arc::new(parking_lot::Mutex::new(None));
    let holder_accepted = Arc::new(parking_lot::Mutex::new(None));
    let other_accepted_clone = Arc::clone(&other_accepted);
    let holder_accepted_clone = Arc::clone(&holder_accepted);
    let gating_runtime = Arc::clone(&runtime);

    let handler: TickHandler = Arc::new(move |_handle: AgentHandle, _event: TimerEvent| {
        let runtime = Arc::clone(&gating_runtime);
        let other_accepted = Arc::clone(&other_accepted_clone);
        let holder_accepted = Arc::clone(&holder_accepted_clone);
        Box::pin(async move {
            *other_accepted.lock() = Some(runtime.bus().publish_broadcast("b", "sneaky"));
            *holder_accepted.lock() = Some(runtime.bus().publish_broadcast("a", "legit"));
            Ok(())
        })
    });

    runtime.start_countdown("a", Duration::from_millis(60), 0.05, 0.05, 0, handler).unwrap();
    tokio::time::advance(Duration::from_millis(200)).await;
    runtime.shutdown().await;

    assert_eq!(*other_accepted.lock(), Some(false));
    assert_eq!(*holder_accepted.lock(), Some(true));
}

#[tokio::test]
async fn shutdown_clears_agents_and_closes_coordinator() {
    let runtime = mock_runtime();
    runtime.spawn_agent(profile("a"), session_config("a"), None).await.unwrap();
    runtime.shutdown().await;
    assert!(runtime.snapshot_diaries().await.is_empty());
}
