// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity, memory, and lifecycle state — the data an agent carries
//! from spawn to shutdown, independent of timers, turns, or the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::LlmSession;

/// Immutable identity seeded at spawn and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub display_name: String,
    pub archetype: String,
    pub summary: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub traits: Vec<String>,
}

impl AgentProfile {
    /// Render the deterministic persona system prompt seeded from this
    /// profile's fields.
    pub fn render_system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}, a {}.\nPersona: {}.\n",
            self.display_name, self.archetype, self.summary
        );
        if !self.goals.is_empty() {
            prompt.push_str("Goals:\n");
            for goal in &self.goals {
                prompt.push_str(&format!("- {goal}\n"));
            }
        }
        if !self.traits.is_empty() {
            prompt.push_str(&format!("Traits: {}.\n", self.traits.join(", ")));
        }
        prompt.push_str("Stay aware that your remaining lifetime is streamed via tool ticks.");
        prompt
    }
}

/// One append-only diary entry. `entry_index` is assigned by [`AgentMemory::remember`]
/// and never reused; `life_index` reflects the life the entry was written in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub life_index: u32,
    pub entry_index: u32,
    pub tick_ms_left: u64,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only ordered sequence of [`DiaryEntry`] for one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diary {
    entries: Vec<DiaryEntry>,
}

impl Diary {
    pub fn add(&mut self, entry: DiaryEntry) {
        self.entries.push(entry);
    }

    pub fn latest(&self) -> Option<&DiaryEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn serialize(&self) -> Vec<DiaryEntry> {
        self.entries.clone()
    }
}

/// Lifecycle-aware memory capsule: the diary plus the current life counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    pub diary: Diary,
    pub life_index: u32,
}

impl AgentMemory {
    pub fn start_new_life(&mut self) {
        self.life_index += 1;
    }

    /// Append a diary entry, assigning the next gap-free `entry_index`.
    pub fn remember(&mut self, text: impl Into<String>, tick_ms_left: u64, tags: Vec<String>) -> DiaryEntry {
        let entry = DiaryEntry {
            life_index: self.life_index,
            entry_index: self.diary.entries().len() as u32 + 1,
            tick_ms_left,
            text: text.into(),
            tags,
            created_at: Utc::now(),
        };
        self.diary.add(entry.clone());
        entry
    }
}

/// Sum of the externally observable lifecycle states. `Respawning` is an
/// internal placeholder only — no transition ever leaves an agent parked
/// there observably; it collapses back to `Alive` within the same call that
/// set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Alive,
    Expired,
    Respawning,
}

/// Mutable holder binding a profile, memory, and LLM session together.
pub struct AgentState {
    pub profile: AgentProfile,
    pub memory: AgentMemory,
    pub session: LlmSession,
    pub status: LifecycleStatus,
    pub last_tick_ms: Option<u64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AgentState {
    pub fn new(profile: AgentProfile, memory: AgentMemory, session: LlmSession) -> Self {
        Self {
            profile,
            memory,
            session,
            status: LifecycleStatus::Alive,
            last_tick_ms: None,
            metadata: Default::default(),
        }
    }

    pub fn mark_dead(&mut self) {
        self.status = LifecycleStatus::Expired;
    }

    pub fn respawn(&mut self) {
        self.status = LifecycleStatus::Respawning;
        self.memory.start_new_life();
        self.status = LifecycleStatus::Alive;
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
