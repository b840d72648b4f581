// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The countdown timer: a randomized-interval ticker that can be nudged
//! awake early (a micro-turn) and cancelled from the outside. One timer
//! drives one agent's countdown for the lifetime of a single life.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// Emitted on every tick, including the terminal tick at expiry.
#[derive(Debug, Clone)]
pub struct TimerEvent {
    pub agent_id: String,
    pub ms_left: u64,
    pub tick_index: u32,
    pub is_terminal: bool,
    pub ts: String,
}

type TickHandler = Arc<dyn Fn(TimerEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A single countdown. Ticks fire at a randomized interval between
/// `tick_seconds` and `tick_seconds_max`, jittered by up to `jitter_ms` in
/// either direction, floored at 50ms so a tiny config never busy-loops.
pub struct Timer {
    agent_id: String,
    duration: Duration,
    tick_seconds: f64,
    tick_seconds_max: f64,
    jitter_ms: u64,
    nudge: Arc<Notify>,
    cancel: CancellationToken,
    started: AtomicBool,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Construct a timer. Returns [`CoreError::Configuration`] if the
    /// interval bounds are nonsensical — a zero or negative `tick_seconds`,
    /// or a max narrower than the minimum.
    pub fn new(
        agent_id: impl Into<String>,
        duration: Duration,
        tick_seconds: f64,
        tick_seconds_max: f64,
        jitter_ms: u64,
    ) -> Result<Self, CoreError> {
        if tick_seconds <= 0.0 {
            return Err(CoreError::Configuration("tick_seconds must be > 0".to_owned()));
        }
        if tick_seconds_max < tick_seconds {
            return Err(CoreError::Configuration("tick_seconds_max must be >= tick_seconds".to_owned()));
        }
        Ok(Self {
            agent_id: agent_id.into(),
            duration,
            tick_seconds,
            tick_seconds_max,
            jitter_ms,
            nudge: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            handle: std::sync::Mutex::new(None),
        })
    }

    /// Start the countdown, invoking `handler` on every tick (including the
    /// terminal one). Returns [`CoreError::AlreadyRunning`] if called twice.
    pub fn start(&self, handler: TickHandler) -> Result<(), CoreError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::AlreadyRunning);
        }

        let agent_id = self.agent_id.clone();
        let duration = self.duration;
        let tick_seconds = self.tick_seconds;
        let tick_seconds_max = self.tick_seconds_max;
        let jitter_ms = self.jitter_ms;
        let nudge = Arc::clone(&self.nudge);
        let cancel = self.cancel.clone();

        let join = tokio::spawn(async move {
            let start = Instant::now();
            let mut tick_index = 0u32;

            loop {
                let elapsed = start.elapsed();
                let remaining = duration.saturating_sub(elapsed);
                let is_terminal = remaining.is_zero();
                let event = TimerEvent {
                    agent_id: agent_id.clone(),
                    ms_left: remaining.as_millis() as u64,
                    tick_index,
                    is_terminal,
                    ts: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                };

                handler(event).await;

                if is_terminal || cancel.is_cancelled() {
                    break;
                }

                tick_index += 1;
                let delay = next_interval(tick_seconds, tick_seconds_max, jitter_ms);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                    _ = nudge.notified() => {}
                }
            }
        });

        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(join);
        Ok(())
    }

    /// Cancel the countdown. The in-flight handler call (if any) still runs
    /// to completion; no further ticks fire afterward.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.nudge.notify_one();
    }

    /// Wait for the countdown task to finish, swallowing join errors caused
    /// by cancellation-induced aborts.
    pub async fn wait(&self) {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Wake the sleeping timer early for an out-of-band tick. A no-op if the
    /// timer has not started or has already finished.
    pub fn request_micro_turn(&self) {
        if self.started.load(Ordering::SeqCst) {
            self.nudge.notify_one();
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

/// `uniform(tick_seconds, tick_seconds_max)`, jittered by up to `jitter_ms`
/// in either direction, floored at 50ms.
fn next_interval(tick_seconds: f64, tick_seconds_max: f64, jitter_ms: u64) -> Duration {
    let mut rng = rand::rng();
    let base = if tick_seconds_max > tick_seconds {
        rng.random_range(tick_seconds..=tick_seconds_max)
    } else {
        tick_seconds
    };
    let jitter_seconds = if jitter_ms == 0 {
        0.0
    } else {
        rng.random_range(-(jitter_ms as f64)..=(jitter_ms as f64)) / 1000.0
    };
    let seconds = (base + jitter_seconds).max(0.05);
    Duration::from_secs_f64(seconds)
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
