use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

fn counting_handler(count: Arc<AtomicU32>, terminal_seen: Arc<AtomicBool>) -> TickHandler {
    Arc::new(move |event: TimerEvent| {
        let count = Arc::clone(&count);
        let terminal_seen = Arc::clone(&terminal_seen);
        Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
            if event.is_terminal {
                terminal_seen.store(true, Ordering::SeqCst);
            }
        })
    })
}

#[test]
fn new_rejects_non_positive_tick_seconds() {
    let err = Timer::new("a", Duration::from_secs(1), 0.0, 1.0, 0).unwrap_err();
    assert_eq!(err.as_str(), "CONFIGURATION");
}

#[test]
fn new_rejects_max_below_min() {
    let err = Timer::new("a", Duration::from_secs(1), 1.0, 0.5, 0).unwrap_err();
    assert_eq!(err.as_str(), "CONFIGURATION");
}

#[tokio::test(start_paused = true)]
async fn start_ticks_until_terminal_then_stops() {
    let timer = Timer::new("agent-1", Duration::from_millis(150), 0.05, 0.05, 0).unwrap();
    let count = Arc::new(AtomicU32::new(0));
    let terminal_seen = Arc::new(AtomicBool::new(false));
    timer.start(counting_handler(Arc::clone(&count), Arc::clone(&terminal_seen))).unwrap();

    tokio::time::advance(Duration::from_millis(500)).await;
    timer.wait().await;

    assert!(terminal_seen.load(Ordering::SeqCst));
    assert!(count.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn start_twice_is_already_running() {
    let timer = Timer::new("agent-1", Duration::from_secs(5), 1.0, 1.0, 0).unwrap();
    let count = Arc::new(AtomicU32::new(0));
    let terminal_seen = Arc::new(AtomicBool::new(false));
    timer.start(counting_handler(Arc::clone(&count), Arc::clone(&terminal_seen))).unwrap();
    let err = timer.start(counting_handler(count, terminal_seen)).unwrap_err();
    assert_eq!(err.as_str(), "ALREADY_RUNNING");
    timer.cancel();
    timer.wait().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_future_ticks() {
    let timer = Timer::new("agent-1", Duration::from_secs(60), 0.05, 0.05, 0).unwrap();
    let count = Arc::new(AtomicU32::new(0));
    let terminal_seen = Arc::new(AtomicBool::new(false));
    timer.start(counting_handler(Arc::clone(&count), Arc::clone(&terminal_seen))).unwrap();

    tokio::time::advance(Duration::from_millis(120)).await;
    timer.cancel();
    timer.wait().await;

    assert!(!terminal_seen.load(Ordering::SeqCst));
    let seen_after_cancel = count.load(Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(count.load(Ordering::SeqCst), seen_after_cancel);
}

#[test]
fn next_interval_is_floored_and_bounded() {
    for _ in 0..200 {
        let d = next_interval(0.05, 0.05, 1000);
        assert!(d.as_secs_f64() >= 0.05 - 1e-9);
    }
}

#[test]
fn next_interval_respects_min_max_band_without_jitter() {
    for _ in 0..200 {
        let d = next_interval(1.0, 2.0, 0);
        assert!(d.as_secs_f64() >= 1.0 - 1e-9);
        assert!(d.as_secs_f64() <= 2.0 + 1e-9);
    }
}
