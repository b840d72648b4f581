// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide coordinator binding timers, the turn coordinator, the
//! shared bus, and telemetry together. Grounded in
//! `orchestration/runtime.py::MortalityRuntime`.
//!
//! Telemetry event taxonomy emitted by this module: `agent.spawned`,
//! `agent.message` (`direction` ∈ {inbound, outbound}), `agent.death`,
//! `agent.respawn`, `timer.started`, `timer.tick`, `timer.expired`,
//! `timer.micro_turn`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;

use crate::bus::SharedBus;
use crate::coordinator::TurnCoordinator;
use crate::error::CoreError;
use crate::llm::{ClientRegistry, LlmMessage, LlmSessionConfig, Role};
use crate::model::{AgentMemory, AgentProfile, AgentState, DiaryEntry};
use crate::telemetry::Recorder;
use crate::timer::{Timer, TimerEvent};

/// A handle to one agent's mutable state. The per-agent lock is the
/// `io_lock` equivalent: at most one completion/diary mutation runs at a
/// time for a given agent, independent of the global turn coordinator.
pub type AgentHandle = Arc<AsyncMutex<AgentState>>;

/// Invoked once per tick, inside the turn coordinator's serialized worker.
pub type TickHandler =
    Arc<dyn Fn(AgentHandle, TimerEvent) -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send>> + Send + Sync>;

/// The process-wide coordinator: owns the provider registry, the live agent
/// map, the timer map, the bus, the turn coordinator, and telemetry.
pub struct Runtime {
    registry: ClientRegistry,
    agents: RwLock<HashMap<String, AgentHandle>>,
    timers: Arc<RwLock<HashMap<String, Arc<Timer>>>>,
    bus: Arc<SharedBus>,
    coordinator: Arc<TurnCoordinator>,
    recorder: Arc<Recorder>,
    last_ms_left: RwLock<HashMap<String, u64>>,
    diary_digests: Mutex<HashMap<(String, String), String>>,
}

impl Runtime {
    pub fn new(registry: ClientRegistry, recorder: Arc<Recorder>) -> Arc<Self> {
        let bus = Arc::new(SharedBus::new());
        let coordinator = Arc::new(TurnCoordinator::new(64));
        let timers: Arc<RwLock<HashMap<String, Arc<Timer>>>> = Arc::new(RwLock::new(HashMap::new()));

        let sub_coordinator = Arc::clone(&coordinator);
        let sub_timers = Arc::clone(&timers);
        let sub_recorder = Arc::clone(&recorder);
        bus.subscribe_broadcasts(Arc::new(move |publisher_id: &str| {
            let target = sub_coordinator.next_waiting_agent(Some(publisher_id));
            let timers = sub_timers.read();
            let listeners_notified = match &target {
                Some(target_id) => {
                    if let Some(timer) = timers.get(target_id) {
                        timer.request_micro_turn();
                    }
                    1
                }
                None => {
                    for timer in timers.values() {
                        timer.request_micro_turn();
                    }
                    timers.len()
                }
            };
            sub_recorder.emit(
                "timer.micro_turn",
                json!({ "publisher_id": publisher_id, "listeners_notified": listeners_notified, "target_id": target }),
            );
        }));

        Arc::new(Self {
            registry,
            agents: RwLock::new(HashMap::new()),
            timers,
            bus,
            coordinator,
            recorder,
            last_ms_left: RwLock::new(HashMap::new()),
            diary_digests: Mutex::new(HashMap::new()),
        })
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Look up the registered client for `provider`. Fails with
    /// [`CoreError::UnknownProvider`] if none is registered — this is the
    /// same lookup `spawn_agent` performs, exposed for handlers that need to
    /// drive a completion outside of spawn.
    pub fn registry_client(&self, provider: crate::llm::LlmProvider) -> Result<Arc<dyn crate::llm::LlmClient>, CoreError> {
        self.registry.get(provider)
    }

    /// Spawn an agent: bind a provider client, create its session, register
    /// with the bus, and emit `agent.spawned`.
    pub async fn spawn_agent(
        &self,
        profile: AgentProfile,
        session_config: LlmSessionConfig,
        memory: Option<AgentMemory>,
    ) -> Result<AgentHandle, CoreError> {
        let client = self.registry.get(session_config.provider)?;
        let provider = session_config.provider;
        let model = session_config.model.clone();
        let session = client.create_session(session_config).await?;
        let memory = memory.unwrap_or_default();
        let agent_id = profile.agent_id.clone();

        self.bus.register_agent(profile.clone());
        self.recorder.emit(
            "agent.spawned",
            json!({
                "agent_id": agent_id,
                "profile": profile,
                "session": { "provider": provider.as_str(), "model": model },
            }),
        );

        let handle = Arc::new(AsyncMutex::new(AgentState::new(profile, memory, session)));
        self.agents.write().insert(agent_id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Start a countdown for `agent_id`. `handler` is invoked once per tick,
    /// serialized through the turn coordinator; its failures are logged and
    /// never abort the countdown.
    #[allow(clippy::too_many_arguments)]
    pub fn start_countdown(
        self: &Arc<Self>,
        agent_id: impl Into<String>,
        duration: Duration,
        tick_seconds: f64,
        tick_seconds_max: f64,
        tick_jitter_ms: u64,
        handler: TickHandler,
    ) -> Result<(), CoreError> {
        let agent_id = agent_id.into();
        let handle = self
            .agents
            .read()
            .get(&agent_id)
            .cloned()
            .ok_or_else(|| CoreError::Handler(format!("no such agent: {agent_id}")))?;

        let timer = Arc::new(Timer::new(agent_id.clone(), duration, tick_seconds, tick_seconds_max, tick_jitter_ms)?);

        self.recorder.emit(
            "timer.started",
            json!({
                "agent_id": agent_id,
                "duration_ms": duration.as_millis() as u64,
                "tick_seconds": tick_seconds,
                "started_at": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            }),
        );

        let runtime = Arc::clone(self);
        let dispatch_agent_id = agent_id.clone();
        timer.start(Arc::new(move |event: TimerEvent| {
            let runtime = Arc::clone(&runtime);
            let handle = Arc::clone(&handle);
            let handler = Arc::clone(&handler);
            let agent_id = dispatch_agent_id.clone();
            Box::pin(async move {
                runtime.recorder.emit(
                    "timer.tick",
                    json!({
                        "agent_id": agent_id,
                        "ms_left": event.ms_left,
                        "tick_index": event.tick_index,
                        "is_terminal": event.is_terminal,
                        "ts": event.ts,
                    }),
                );
                runtime.last_ms_left.write().insert(agent_id.clone(), event.ms_left);

                let turn_handle = Arc::clone(&handle);
                let turn_event = event.clone();
                let turn_handler = Arc::clone(&handler);
                let turn_bus = Arc::clone(&runtime.bus);
                let turn_coordinator = Arc::clone(&runtime.coordinator);
                let turn_agent_id = agent_id.clone();
                let result = runtime
                    .coordinator
                    .submit(
                        agent_id.clone(),
                        Box::new(move || {
                            Box::pin(async move {
                                let turn_index = turn_coordinator.next_turn_index();
                                turn_bus.start_turn(turn_agent_id.clone(), turn_index);
                                let outcome = (turn_handler)(turn_handle, turn_event).await;
                                turn_bus.end_turn(&turn_agent_id);
                                outcome
                            })
                        }),
                    )
                    .await;
                if let Err(err) = result {
                    tracing::warn!(agent_id = %agent_id, %err, "tick handler failed");
                }

                if event.is_terminal {
                    handle.lock().await.mark_dead();
                    runtime.recorder.emit("agent.death", json!({ "agent_id": agent_id }));
                    runtime.recorder.emit("timer.expired", json!({ "agent_id": agent_id }));
                }
            })
        }))?;

        self.timers.write().insert(agent_id, timer);
        Ok(())
    }

    /// Respawn a dead agent in place: bump its life index, flip it back to
    /// `Alive`, and emit `agent.respawn`. Nothing in this driver calls this
    /// automatically — respawn is offered as a capability for embedding
    /// callers, not an automatic policy (see DESIGN.md).
    pub async fn respawn_agent(&self, agent_id: &str) -> Result<(), CoreError> {
        let handle = self
            .agents
            .read()
            .get(agent_id)
            .cloned()
            .ok_or_else(|| CoreError::Handler(format!("no such agent: {agent_id}")))?;
        let life_index = {
            let mut state = handle.lock().await;
            state.respawn();
            state.memory.life_index
        };
        self.recorder.emit("agent.respawn", json!({ "agent_id": agent_id, "life_index": life_index }));
        Ok(())
    }

    /// Fetch peer broadcasts and render them as inbound messages,
    /// suppressing repeats for a `(requestor, owner)` pair whose entry set
    /// has not changed since the last fetch.
    pub fn peer_diary_messages(&self, requestor_id: &str, owners: &[String], limit_per_owner: usize) -> Vec<LlmMessage> {
        let resources = self.bus.fetch_broadcasts(requestor_id, owners, limit_per_owner);
        let mut digests = self.diary_digests.lock();
        let mut messages = Vec::new();
        for resource in resources {
            let key = (requestor_id.to_owned(), resource.owner_id.clone());
            let digest = format!("{:x}", Sha256::digest(resource.text.as_bytes()));
            let changed = digests.get(&key) != Some(&digest);
            digests.insert(key, digest);
            if changed {
                messages.push(LlmMessage::new(Role::System, resource.text));
            }
        }
        messages
    }

    /// Read-only snapshot of every agent's diary, for bundle assembly.
    pub async fn snapshot_diaries(&self) -> HashMap<String, Vec<DiaryEntry>> {
        let handles: Vec<(String, AgentHandle)> =
            self.agents.read().iter().map(|(id, h)| (id.clone(), Arc::clone(h))).collect();
        let mut out = HashMap::new();
        for (agent_id, handle) in handles {
            let state = handle.lock().await;
            out.insert(agent_id, state.memory.diary.serialize());
        }
        out
    }

    /// Last-known `ms_left` per agent, excluding one agent if requested.
    pub fn peer_timer_snapshot(&self, exclude: Option<&str>) -> HashMap<String, u64> {
        self.last_ms_left
            .read()
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != exclude)
            .map(|(id, ms)| (id.clone(), *ms))
            .collect()
    }

    /// Per-agent `{routed_models, last_routed_model}` as recorded on the
    /// LLM session's free-form attributes.
    pub async fn snapshot_agent_routes(&self) -> HashMap<String, serde_json::Value> {
        let handles: Vec<(String, AgentHandle)> =
            self.agents.read().iter().map(|(id, h)| (id.clone(), Arc::clone(h))).collect();
        let mut out = HashMap::new();
        for (agent_id, handle) in handles {
            let state = handle.lock().await;
            let routed_models = state.session.attributes.get("routed_models").cloned().unwrap_or(json!([]));
            let last_routed_model =
                state.session.attributes.get("last_routed_model").cloned().unwrap_or(serde_json::Value::Null);
            out.insert(agent_id, json!({ "routed_models": routed_models, "last_routed_model": last_routed_model }));
        }
        out
    }

    /// Cancel every timer, wait for each to finish, drain the coordinator,
    /// clear agent/timer state, and close every registered client.
    pub async fn shutdown(&self) {
        let timers: Vec<Arc<Timer>> = self.timers.write().drain().map(|(_, t)| t).collect();
        for timer in &timers {
            timer.cancel();
        }
        for timer in &timers {
            timer.wait().await;
        }
        self.coordinator.aclose().await;
        self.agents.write().clear();
        self.last_ms_left.write().clear();
        for client in self.registry.clients() {
            if let Err(err) = client.aclose().await {
                tracing::warn!(%err, "client failed to close cleanly");
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
