// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The LLM collaborator contract: provider enum, message/session types, and
//! the registry that dispatches a session to the client matching its
//! provider. The vendor wire protocols themselves are out of scope for the
//! core — only `Mock` and `OpenRouter` have real constructors wired into
//! [`register_default_clients`]; the remaining variants exist so the core's
//! `UnknownProvider` failure path has something concrete to name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub mod mock;
pub mod openrouter;

/// Supported upstream LLM vendors. Only [`LlmProvider::Mock`] and
/// [`LlmProvider::OpenRouter`] have a client wired up by this core; the
/// others are recognized but always yield `UnknownProvider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Grok,
    Gemini,
    OpenRouter,
    Mock,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Grok => "grok",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
            Self::Mock => "mock",
        }
    }

    /// Parse a provider name from config/env input (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "grok" => Some(Self::Grok),
            "gemini" => Some(Self::Gemini),
            "openrouter" => Some(Self::OpenRouter),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat message role, shared across all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Developer,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Unified chat message model across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub ts: String,
}

impl LlmMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), name: None, metadata: Default::default(), ts: now_iso() }
    }

    pub fn named(role: Role, name: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(role, content);
        msg.name = Some(name.into());
        msg
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub ts: String,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One response from the LLM collaborator.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Provider-agnostic session knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSessionConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

/// An active conversation with a provider.
#[derive(Debug, Clone)]
pub struct LlmSession {
    pub id: String,
    pub config: LlmSessionConfig,
    pub history: Vec<LlmMessage>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl LlmSession {
    pub fn new(config: LlmSessionConfig) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), config, history: Vec::new(), attributes: Default::default() }
    }

    pub fn append(&mut self, message: LlmMessage) {
        self.history.push(message);
    }
}

/// Minimal interface every provider client must implement.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> LlmProvider;

    async fn create_session(&self, config: LlmSessionConfig) -> Result<LlmSession, CoreError>;

    async fn complete(
        &self,
        session: &mut LlmSession,
        messages: &[LlmMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<Completion, CoreError>;

    /// Release provider resources. No-op by default.
    async fn aclose(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Name of the designated tick tool, wired into every handler turn.
pub const TICK_TOOL_NAME: &str = "mortality.tick";

/// Encode a timer tick as a tool message for every provider.
pub fn make_tick_tool_message(ms_left: Option<u64>, cause: &str) -> LlmMessage {
    let payload = serde_json::json!({ "t_ms_left": ms_left, "cause": cause });
    LlmMessage::named(Role::Tool, TICK_TOOL_NAME, payload.to_string())
}

/// Registry for dynamically selected provider clients.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<LlmProvider, Arc<dyn LlmClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client: Arc<dyn LlmClient>) {
        self.clients.insert(client.provider(), client);
    }

    pub fn get(&self, provider: LlmProvider) -> Result<Arc<dyn LlmClient>, CoreError> {
        self.clients.get(&provider).cloned().ok_or(CoreError::UnknownProvider(provider))
    }

    pub fn providers(&self) -> Vec<LlmProvider> {
        self.clients.keys().copied().collect()
    }

    pub fn clients(&self) -> Vec<Arc<dyn LlmClient>> {
        self.clients.values().cloned().collect()
    }
}

/// Best-effort registration for every provider this core ships a client for.
///
/// Each constructor that fails to initialize (missing credential, disabled
/// feature) is skipped silently — this mirrors the historical Python
/// `register_default_clients`, which never raises on a single provider's
/// absence.
pub fn register_default_clients(registry: &mut ClientRegistry) {
    registry.register(Arc::new(mock::MockClient::new()));
    match openrouter::OpenRouterClient::from_env() {
        Ok(client) => registry.register(Arc::new(client)),
        Err(err) => {
            tracing::debug!(%err, "openrouter client unavailable, skipping");
        }
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
