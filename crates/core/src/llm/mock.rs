// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic, network-free collaborator used by the `mock` provider and
//! the end-to-end test scenarios in §8 of the spec.

use async_trait::async_trait;

use super::{Completion, LlmClient, LlmMessage, LlmProvider, LlmSession, LlmSessionConfig, Role, ToolSpec};
use crate::error::CoreError;

/// Echoes a short deterministic line derived from the last tick tool
/// message it sees. Never calls out to the network.
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Mock
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
        let ms_left = messages
            .iter()
            .find(|m| m.role == Role::Tool && m.name.as_deref() == Some(super::TICK_TOOL_NAME))
            .and_then(|m| serde_json::from_str::<serde_json::Value>(&m.content).ok())
            .and_then(|v| v.get("t_ms_left").cloned())
            .unwrap_or(serde_json::Value::Null);

        let text = format!("{} notes {ms_left} ms remaining.", session.config.model);
        Ok(Completion { text, tool_calls: Vec::new(), metadata: Default::default() })
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
