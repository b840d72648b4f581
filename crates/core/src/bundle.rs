// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the final JSON bundle written at the end of a run. Grounded in
//! `telemetry/recorder.py::StructuredTelemetrySink.build_bundle` — the key
//! order below is a binding contract for external bundle consumers, not a
//! stylistic choice, and must be preserved exactly.

use sha2::{Digest, Sha256};

use crate::model::AgentProfile;
use crate::telemetry::{TelemetryEvent, SCHEMA_VERSION};

/// Everything the caller supplies beyond what the recorder already knows.
#[derive(Default)]
pub struct BundleInputs {
    pub diaries: serde_json::Value,
    pub metadata: serde_json::Value,
    pub experiment: serde_json::Value,
    pub config: serde_json::Value,
    pub llm: serde_json::Value,
    pub extra: serde_json::Value,
    pub system_prompt: Option<String>,
}

/// Assemble the bundle object in its fixed, externally-depended-on key
/// order. `agent_profiles` comes from [`crate::telemetry::Recorder::agent_profiles`].
pub fn build_bundle(
    inputs: BundleInputs,
    agent_profiles: std::collections::HashMap<String, AgentProfile>,
    events: Vec<TelemetryEvent>,
) -> serde_json::Value {
    let mut metadata = match inputs.metadata {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_owned(), other);
            map
        }
    };

    if let Some(prompt) = &inputs.system_prompt {
        let digest = Sha256::digest(prompt.as_bytes());
        metadata.insert("system_prompt_sha256".to_owned(), serde_json::Value::String(format!("{digest:x}")));
    }

    let agents: serde_json::Map<String, serde_json::Value> = agent_profiles
        .into_iter()
        .map(|(id, profile)| (id, serde_json::to_value(profile).unwrap_or(serde_json::Value::Null)))
        .collect();

    let exported_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let mut ordered = serde_json::Map::new();
    ordered.insert("bundle_type".to_owned(), serde_json::Value::String("mortality/ui#events".to_owned()));
    ordered.insert("schema_version".to_owned(), serde_json::Value::from(SCHEMA_VERSION));
    ordered.insert("exported_at".to_owned(), serde_json::Value::String(exported_at));
    ordered.insert("experiment".to_owned(), inputs.experiment);
    ordered.insert("config".to_owned(), inputs.config);
    ordered.insert("llm".to_owned(), inputs.llm);
    ordered.insert("agents".to_owned(), serde_json::Value::Object(agents));
    ordered.insert("metadata".to_owned(), serde_json::Value::Object(metadata));
    ordered.insert("diaries".to_owned(), inputs.diaries);
    ordered.insert(
        "events".to_owned(),
        serde_json::to_value(events).unwrap_or(serde_json::Value::Array(Vec::new())),
    );
    ordered.insert("extra".to_owned(), inputs.extra);
    if let Some(prompt) = inputs.system_prompt {
        ordered.insert("system_prompt".to_owned(), serde_json::Value::String(prompt));
    }

    serde_json::Value::Object(ordered)
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod tests;
