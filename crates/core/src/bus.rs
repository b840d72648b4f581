// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared bus: a turn-gated broadcast point. Agents publish short public
//! snippets during their own turn; peers read the most recent snippets per
//! owner. Diaries never pass through here — see [`crate::model::Diary`] for
//! the private, non-bus-visible memory store.
//!
//! This intentionally does **not** resurrect the historical grant/consent
//! protocol (access tokens, TTLs, max-uses) that once gated diary reads.
//! Reads here are a plain, unauthenticated fetch of the most recent N
//! snippets per owner.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::AgentProfile;

/// A single public broadcast, owned by the agent that published it.
#[derive(Debug, Clone)]
pub struct BroadcastSnippet {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// The rendered, human-readable view of another agent's recent broadcasts,
/// as returned by [`SharedBus::fetch_broadcasts`].
#[derive(Debug, Clone)]
pub struct BroadcastResource {
    pub owner_id: String,
    pub text: String,
}

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

struct ActiveTurn {
    agent_id: String,
    turn_index: u64,
}

#[derive(Default)]
struct BusState {
    broadcasts: HashMap<String, Vec<BroadcastSnippet>>,
    profiles: HashMap<String, AgentProfile>,
    active_turn: Option<ActiveTurn>,
}

/// Publish/subscribe channel for broadcast snippets, gated to the current
/// turn holder. Grounded in the teacher's `Aggregator`/`MuxState` shape
/// (`mux/src/state.rs`, `mux/src/events.rs`) — a `RwLock`-guarded map plus a
/// listener list — adapted from a session-keyed cache to an agent-keyed
/// broadcast store.
pub struct SharedBus {
    state: RwLock<BusState>,
    listeners: RwLock<Vec<Listener>>,
}

impl SharedBus {
    pub fn new() -> Self {
        Self { state: RwLock::new(BusState::default()), listeners: RwLock::new(Vec::new()) }
    }

    /// Idempotent: re-registering the same agent does not duplicate its bucket.
    pub fn register_agent(&self, profile: AgentProfile) {
        let mut state = self.state.write();
        state.broadcasts.entry(profile.agent_id.clone()).or_default();
        state.profiles.insert(profile.agent_id.clone(), profile);
    }

    pub fn start_turn(&self, agent_id: impl Into<String>, turn_index: u64) {
        self.state.write().active_turn = Some(ActiveTurn { agent_id: agent_id.into(), turn_index });
    }

    pub fn end_turn(&self, agent_id: &str) {
        let mut state = self.state.write();
        if state.active_turn.as_ref().is_some_and(|t| t.agent_id == agent_id) {
            state.active_turn = None;
        }
    }

    /// Append a snippet iff `agent_id` owns the current turn or no turn is
    /// active; otherwise silently drop it. Returns whether it was accepted.
    pub fn publish_broadcast(&self, agent_id: &str, text: impl Into<String>) -> bool {
        {
            let mut state = self.state.write();
            let holds_turn = match &state.active_turn {
                Some(turn) => turn.agent_id == agent_id,
                None => true,
            };
            if !holds_turn {
                return false;
            }
            let snippet = BroadcastSnippet { text: text.into(), created_at: Utc::now() };
            state.broadcasts.entry(agent_id.to_owned()).or_default().push(snippet);
        }
        for listener in self.listeners.read().iter() {
            listener(agent_id);
        }
        true
    }

    /// Register a listener notified (with the publishing agent's id) after
    /// every accepted publish. Deduped by `Arc` identity: re-subscribing the
    /// same listener is a no-op.
    pub fn subscribe_broadcasts(&self, listener: Listener) {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return;
        }
        listeners.push(listener);
    }

    /// For each owner other than `requestor_id`, the most recent `limit`
    /// snippets in chronological order, rendered as a digest. Owners with no
    /// snippets produce no resource.
    pub fn fetch_broadcasts(&self, requestor_id: &str, owners: &[String], limit: usize) -> Vec<BroadcastResource> {
        if limit == 0 {
            return Vec::new();
        }
        let state = self.state.read();
        let mut resources = Vec::new();
        for owner_id in owners {
            if owner_id == requestor_id {
                continue;
            }
            let Some(snippets) = state.broadcasts.get(owner_id) else { continue };
            if snippets.is_empty() {
                continue;
            }
            let start = snippets.len().saturating_sub(limit);
            let recent = &snippets[start..];
            let mut text = format!("Recent broadcasts from {owner_id} (via bus):\n");
            for snippet in recent {
                text.push_str(&format!(
                    "[{}] {}\n",
                    snippet.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                    snippet.text
                ));
            }
            resources.push(BroadcastResource { owner_id: owner_id.clone(), text });
        }
        resources
    }
}

impl Default for SharedBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
