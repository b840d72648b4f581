// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The driver: wires environment configuration into a [`mortality_core::Runtime`],
//! spawns one agent per configured model, races the run against SIGINT, and
//! writes the final JSON bundle. Grounded in `orchestration/runtime.py`'s
//! top-level driver and the teacher's `event_log.rs` append-only file
//! discipline (generalized here to a single atomic full-file write).

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mortality_core::bundle::{build_bundle, BundleInputs};
use mortality_core::llm::{
    make_tick_tool_message, register_default_clients, ClientRegistry, LlmProvider, LlmSessionConfig,
};
use mortality_core::model::AgentProfile;
use mortality_core::runtime::{AgentHandle, TickHandler};
use mortality_core::telemetry::{ConsoleSink, FanoutSink, Recorder, TelemetrySink, WsDashboardSink};
use mortality_core::{Runtime, TimerEvent};
use rand::Rng;
use serde_json::json;

use crate::config::EmergentConfig;
use crate::ws::DashboardState;

/// Outcome of one run, used by `main` to pick an exit code.
pub struct RunResult {
    pub interrupted: bool,
    pub bundle_path: PathBuf,
}

/// Install the global `tracing` subscriber. `RUST_LOG` selects the filter
/// (default `info`); `MORTALITY_LOG_FORMAT=json` switches to structured JSON
/// lines. Uses `try_init` so repeated calls (e.g. from tests) are harmless.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match std::env::var("MORTALITY_LOG_FORMAT").as_deref() {
        Ok("json") => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

pub async fn run(config: EmergentConfig) -> anyhow::Result<RunResult> {
    let provider = LlmProvider::from_name(&config.provider)
        .ok_or_else(|| anyhow::anyhow!("unknown --provider: {}", config.provider))?;

    if provider == LlmProvider::OpenRouter && std::env::var("OPENROUTER_API_KEY").is_err() {
        anyhow::bail!("OPENROUTER_API_KEY must be set when --provider=openrouter");
    }

    let mut registry = ClientRegistry::new();
    register_default_clients(&mut registry);

    let console_sink: Arc<dyn TelemetrySink> = Arc::new(ConsoleSink::new(false));
    let dashboard_sink = config.live_dashboard.then(|| Arc::new(WsDashboardSink::new(256)));
    let mut sinks: Vec<Arc<dyn TelemetrySink>> = vec![console_sink];
    if let Some(sink) = &dashboard_sink {
        sinks.push(Arc::clone(sink) as Arc<dyn TelemetrySink>);
    }
    let recorder = Arc::new(Recorder::new(Arc::new(FanoutSink::new(sinks))));

    let runtime = Runtime::new(registry, Arc::clone(&recorder));

    if let Some(sink) = dashboard_sink {
        let dashboard_state = Arc::new(DashboardState::new(Arc::clone(&runtime), sink));
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.ws_port)).await?;
        tokio::spawn(async move {
            let router = crate::ws::router(dashboard_state);
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(%err, "dashboard server failed");
            }
        });
    }

    let models = if provider == LlmProvider::Mock && config.model_list().is_empty() {
        vec!["mock-1".to_owned()]
    } else {
        config.model_list()
    };

    let agent_ids: Vec<String> = (0..models.len()).map(|index| format!("agent-{index}")).collect();

    let mut max_duration = Duration::from_secs(config.spread_end * 60);
    for (index, model) in models.iter().enumerate() {
        let agent_id = agent_ids[index].clone();
        let profile = AgentProfile {
            agent_id: agent_id.clone(),
            display_name: model.clone(),
            archetype: "collaborator".to_owned(),
            summary: format!("an agent running on {model}"),
            goals: vec![],
            traits: vec![],
        };
        let system_prompt = profile.render_system_prompt();
        let session_config = LlmSessionConfig {
            provider,
            model: model.clone(),
            system_prompt,
            temperature: 0.7,
            top_p: 0.9,
            max_output_tokens: None,
            metadata: Default::default(),
        };

        runtime.spawn_agent(profile, session_config, None).await?;

        let duration = duration_in_spread(config.spread_start, config.spread_end);
        max_duration = max_duration.max(duration);
        runtime.start_countdown(
            agent_id,
            duration,
            config.tick_seconds,
            config.tick_seconds_max,
            0,
            tick_handler(Arc::clone(&runtime), agent_ids.clone()),
        )?;
    }

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = tokio::time::sleep(max_duration + Duration::from_secs(5)) => false,
    };

    runtime.shutdown().await;

    let diaries = runtime.snapshot_diaries().await;
    let agent_routes = runtime.snapshot_agent_routes().await;
    let agent_profiles = recorder.agent_profiles();
    let events = recorder.events();

    let metadata = run_metadata(interrupted, &agent_ids);
    let bundle = build_bundle(
        BundleInputs {
            diaries: serde_json::to_value(&diaries).unwrap_or_default(),
            metadata,
            experiment: json!({ "provider": provider.as_str(), "models": models }),
            config: json!({
                "spread_start_minutes": config.spread_start,
                "spread_end_minutes": config.spread_end,
                "tick_seconds": config.tick_seconds,
                "tick_seconds_max": config.tick_seconds_max,
            }),
            llm: json!({ "routes": agent_routes }),
            extra: serde_json::Value::Object(Default::default()),
            system_prompt: None,
        },
        agent_profiles,
        events,
    );

    let bundle_path = write_bundle(&bundle)?;

    Ok(RunResult { interrupted, bundle_path })
}

/// The bundle's `metadata.status`/`metadata.agent_ids` fields, split out so
/// the spawned-agent-set contract can be unit-tested without driving a full
/// run.
fn run_metadata(interrupted: bool, agent_ids: &[String]) -> serde_json::Value {
    json!({
        "status": if interrupted { "interrupted" } else { "completed" },
        "agent_ids": agent_ids,
    })
}

fn duration_in_spread(start_minutes: u64, end_minutes: u64) -> Duration {
    let minutes = if end_minutes > start_minutes {
        rand::rng().random_range(start_minutes..=end_minutes)
    } else {
        start_minutes
    };
    Duration::from_secs(minutes * 60)
}

/// The minimal default handler: surfaces peer broadcasts, asks the
/// provider client for a completion, logs it to the agent's diary, and
/// publishes it to the bus. Scenario-specific prompting beyond this wiring
/// is left to callers embedding this core.
fn tick_handler(runtime: Arc<Runtime>, all_agent_ids: Vec<String>) -> TickHandler {
    Arc::new(move |handle: AgentHandle, event: TimerEvent| {
        let runtime = Arc::clone(&runtime);
        let peers: Vec<String> = all_agent_ids.clone();
        Box::pin(async move {
            let mut state = handle.lock().await;
            let agent_id = state.profile.agent_id.clone();

            let peer_messages = runtime.peer_diary_messages(&agent_id, &peers, 3);
            for message in &peer_messages {
                runtime.recorder().emit(
                    "agent.message",
                    json!({ "agent_id": agent_id, "direction": "inbound", "content": message.content }),
                );
            }
            let tick_message = make_tick_tool_message(
                if event.is_terminal { None } else { Some(event.ms_left) },
                "countdown",
            );

            let mut messages = peer_messages;
            messages.push(tick_message);

            let provider = state.session.config.provider;
            let client = runtime.registry_client(provider)?;
            let completion = client.complete(&mut state.session, &messages, None).await?;

            for call in &completion.tool_calls {
                runtime.recorder().emit(
                    "agent.tool_call",
                    json!({ "agent_id": agent_id, "name": call.name, "arguments": call.arguments, "call_id": call.call_id }),
                );
                runtime.recorder().emit(
                    "agent.tool_result",
                    json!({ "agent_id": agent_id, "name": call.name, "call_id": call.call_id }),
                );
            }

            runtime.recorder().emit(
                "agent.message",
                json!({ "agent_id": agent_id, "direction": "outbound", "content": completion.text }),
            );

            let entry = state.memory.remember(completion.text.clone(), event.ms_left, vec![]);
            runtime.recorder().emit(
                "agent.diary_entry",
                json!({ "agent_id": agent_id, "entry": entry }),
            );
            runtime.bus().publish_broadcast(&agent_id, completion.text);

            Ok(())
        })
    })
}

fn write_bundle(bundle: &serde_json::Value) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all("runs")?;
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let final_path = PathBuf::from(format!("runs/emergent-{timestamp}.json"));

    let mut temp = tempfile::NamedTempFile::new_in("runs")?;
    temp.write_all(serde_json::to_string_pretty(bundle)?.as_bytes())?;
    temp.persist(&final_path)?;

    Ok(final_path)
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
