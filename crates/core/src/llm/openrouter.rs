// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin OpenRouter collaborator. Only the chat-completions endpoint needed
//! to drive a tick/react loop is implemented; routing metadata surfaces
//! through `Completion::metadata` for `Runtime::snapshot_agent_routes`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{Completion, LlmClient, LlmMessage, LlmProvider, LlmSession, LlmSessionConfig, Role, ToolCall, ToolSpec};
use crate::error::CoreError;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    /// Construct a client from `OPENROUTER_API_KEY`. Returns an error (never
    /// panics) when the credential is absent — callers are expected to skip
    /// registration on failure, per [`super::register_default_clients`].
    pub fn from_env() -> Result<Self, CoreError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| CoreError::Configuration("OPENROUTER_API_KEY not set".to_owned()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CoreError::Configuration(format!("failed to build http client: {e}")))?;
        Ok(Self { http, api_key, base_url: DEFAULT_BASE_URL.to_owned() })
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Developer => "developer",
        }
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenRouter
    }

    async fn create_session(&self, config: LlmSessionConfig) -> Result<LlmSession, CoreError> {
        Ok(LlmSession::new(config))
    }

    async fn complete(
        &self,
        session: &mut LlmSession,
        messages: &[LlmMessage],
        _tools: Option<&[ToolSpec]>,
    ) -> Result<Completion, CoreError> {
        let mut wire_messages = vec![json!({
            "role": "system",
            "content": session.config.system_prompt,
        })];
        for message in messages {
            wire_messages.push(json!({
                "role": Self::role_str(message.role),
                "content": message.content,
            }));
        }

        let body = json!({
            "model": session.config.model,
            "messages": wire_messages,
            "temperature": session.config.temperature,
            "top_p": session.config.top_p,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Llm(format!("openrouter request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::Llm(format!("openrouter returned status {}", response.status())));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Llm(format!("openrouter response not json: {e}")))?;

        let text = value
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned();
        let routed_model =
            value.get("model").and_then(|v| v.as_str()).unwrap_or(&session.config.model).to_owned();

        let mut metadata = serde_json::Map::new();
        metadata.insert("model".to_owned(), serde_json::Value::String(routed_model));

        let tool_calls = value
            .pointer("/choices/0/message/tool_calls")
            .and_then(|v| v.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let name = c.pointer("/function/name")?.as_str()?.to_owned();
                        let args_raw = c.pointer("/function/arguments")?.as_str().unwrap_or("{}");
                        let arguments = serde_json::from_str(args_raw).unwrap_or_default();
                        Some(ToolCall {
                            name,
                            arguments,
                            call_id: c.get("id").and_then(|v| v.as_str()).map(str::to_owned),
                            ts: chrono::Utc::now().to_rfc3339(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Completion { text, tool_calls, metadata })
    }
}

#[cfg(test)]
#[path = "openrouter_tests.rs"]
mod tests;
