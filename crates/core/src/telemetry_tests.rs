use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use super::*;

struct CountingSink {
    count: Arc<AtomicUsize>,
}

impl TelemetrySink for CountingSink {
    fn emit(&self, _event: &TelemetryEvent) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn seq_is_gap_free_and_monotone() {
    let recorder = Recorder::new(Arc::new(NullSink));
    recorder.emit("timer.tick", json!({"n": 1}));
    recorder.emit("timer.tick", json!({"n": 2}));
    recorder.emit("timer.tick", json!({"n": 3}));
    let events = recorder.events();
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.seq, i as u64);
    }
}

#[test]
fn agent_spawned_snapshots_profile() {
    let recorder = Recorder::new(Arc::new(NullSink));
    recorder.emit(
        "agent.spawned",
        json!({
            "agent_id": "a",
            "profile": {
                "agent_id": "a",
                "display_name": "Ada",
                "archetype": "strategist",
                "summary": "careful",
                "goals": [],
                "traits": [],
            }
        }),
    );
    let profiles = recorder.agent_profiles();
    assert_eq!(profiles.get("a").unwrap().display_name, "Ada");
}

#[test]
fn fanout_forwards_to_every_sink() {
    let count_a = Arc::new(AtomicUsize::new(0));
    let count_b = Arc::new(AtomicUsize::new(0));
    let fanout = FanoutSink::new(vec![
        Arc::new(CountingSink { count: Arc::clone(&count_a) }),
        Arc::new(CountingSink { count: Arc::clone(&count_b) }),
    ]);
    let recorder = Recorder::new(Arc::new(fanout));
    recorder.emit("timer.tick", json!({}));
    assert_eq!(count_a.load(Ordering::SeqCst), 1);
    assert_eq!(count_b.load(Ordering::SeqCst), 1);
}

#[test]
fn ws_dashboard_sink_does_not_block_without_subscribers() {
    let sink = WsDashboardSink::new(4);
    let recorder = Recorder::new(Arc::new(sink));
    for i in 0..3 {
        recorder.emit("timer.tick", json!({"n": i}));
    }
    assert_eq!(recorder.events().len(), 3);
}

#[test]
fn ws_dashboard_subscriber_receives_events() {
    let sink = WsDashboardSink::new(4);
    let mut rx = sink.subscribe();
    let recorder = Recorder::new(Arc::new(sink));
    recorder.emit("timer.tick", json!({"n": 1}));
    let received = rx.try_recv().unwrap();
    assert_eq!(received.event, "timer.tick");
}

#[test]
fn null_sink_discards_without_panic() {
    let recorder = Recorder::new(Arc::new(NullSink));
    recorder.emit("timer.tick", json!({}));
    assert_eq!(recorder.events().len(), 1);
}
