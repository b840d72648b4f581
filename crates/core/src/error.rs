// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use crate::llm::LlmProvider;

/// Errors the core distinguishes at setup, submit, and handler boundaries.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// Invalid configuration caught before any agent is spawned.
    Configuration(String),
    /// `spawn_agent` found no registered client for the requested provider.
    UnknownProvider(LlmProvider),
    /// A tick handler returned an error; the coordinator logs and continues.
    Handler(String),
    /// The LLM collaborator failed to produce a completion.
    Llm(String),
    /// `Timer::start` was called on a timer that is already running.
    AlreadyRunning,
    /// The turn coordinator has been closed; no further jobs are accepted.
    CoordinatorClosed,
}

impl CoreError {
    /// Machine-readable variant name, stable across releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            Self::Handler(_) => "HANDLER",
            Self::Llm(_) => "LLM",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::CoordinatorClosed => "COORDINATOR_CLOSED",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::UnknownProvider(provider) => write!(f, "unknown provider: {provider}"),
            Self::Handler(msg) => write!(f, "handler error: {msg}"),
            Self::Llm(msg) => write!(f, "llm error: {msg}"),
            Self::AlreadyRunning => write!(f, "timer already running"),
            Self::CoordinatorClosed => write!(f, "coordinator closed"),
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
