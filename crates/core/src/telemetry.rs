// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The telemetry event recorder and its fan-out sinks. Grounded in
//! `telemetry/recorder.py` (sequencing, agent-profile snapshotting) and
//! `telemetry/base.py` (the sink protocol and its implementations).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::AgentProfile;

/// Schema version stamped into every bundle produced by [`crate::bundle`].
pub const SCHEMA_VERSION: u32 = 2;

/// One recorded occurrence, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub seq: u64,
    pub event: String,
    pub ts: String,
    pub payload: serde_json::Value,
}

/// A destination for telemetry events. Implementors must never let an
/// internal failure propagate — swallow and log instead, so one broken sink
/// never disables the others.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &TelemetryEvent);
}

/// Discards everything.
#[derive(Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&self, _event: &TelemetryEvent) {}
}

/// Logs a compact line per event through `tracing`, not raw `println!`, to
/// stay aligned with the teacher's structured-logging-everywhere norm.
#[derive(Default)]
pub struct ConsoleSink {
    pretty: bool,
}

impl ConsoleSink {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl TelemetrySink for ConsoleSink {
    fn emit(&self, event: &TelemetryEvent) {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&event.payload).unwrap_or_default()
        } else {
            event.payload.to_string()
        };
        tracing::info!("[telemetry] {}: {rendered}", event.event);
    }
}

/// Forwards every event to each wrapped sink, swallowing per-sink panics'
/// worth of isolation by simply not letting one sink's `emit` stop the loop.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }
}

impl TelemetrySink for FanoutSink {
    fn emit(&self, event: &TelemetryEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// A process-wide broadcast sink for the optional WebSocket dashboard.
/// Never back-pressures the emitter: a full channel just drops the event
/// for slow/absent subscribers, mirroring `let _ = tx.send(...)` in the
/// teacher's `mux/src/events.rs`.
pub struct WsDashboardSink {
    tx: broadcast::Sender<TelemetryEvent>,
}

impl WsDashboardSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }
}

impl TelemetrySink for WsDashboardSink {
    fn emit(&self, event: &TelemetryEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Assigns `seq`/`ts`, buffers every event, and snapshots agent profiles on
/// `agent.spawned` so a bundle can list agents even without a separate pass.
pub struct Recorder {
    events: Mutex<Vec<TelemetryEvent>>,
    agent_profiles: Mutex<HashMap<String, AgentProfile>>,
    sink: Arc<dyn TelemetrySink>,
}

impl Recorder {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { events: Mutex::new(Vec::new()), agent_profiles: Mutex::new(HashMap::new()), sink }
    }

    /// Record and forward one event. `payload` should already carry every
    /// field the event name promises (see the taxonomy in the module docs
    /// of [`crate::runtime`]).
    pub fn emit(&self, event_name: &str, payload: serde_json::Value) {
        if event_name == "agent.spawned" {
            if let Some(agent_id) = payload.get("agent_id").and_then(|v| v.as_str()) {
                if let Some(profile) = payload.get("profile").and_then(|v| serde_json::from_value(v.clone()).ok()) {
                    self.agent_profiles.lock().insert(agent_id.to_owned(), profile);
                }
            }
        }

        let event = {
            let mut events = self.events.lock();
            let seq = events.len() as u64;
            let event = TelemetryEvent {
                seq,
                event: event_name.to_owned(),
                ts: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                payload,
            };
            events.push(event.clone());
            event
        };
        self.sink.emit(&event);
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn agent_profiles(&self) -> HashMap<String, AgentProfile> {
        self.agent_profiles.lock().clone()
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
