// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core primitives for a countdown-driven multi-agent run: a randomized
//! interruptible timer, a serialized turn coordinator, a turn-gated
//! broadcast bus, a sequenced telemetry recorder, and the runtime that
//! binds them together. The CLI crate is the process that configures and
//! drives this core against a real or mock LLM collaborator.

pub mod bundle;
pub mod bus;
pub mod coordinator;
pub mod error;
pub mod llm;
pub mod model;
pub mod runtime;
pub mod telemetry;
pub mod timer;

pub use bus::{BroadcastResource, BroadcastSnippet, SharedBus};
pub use coordinator::TurnCoordinator;
pub use error::CoreError;
pub use runtime::{AgentHandle, Runtime, TickHandler};
pub use telemetry::{Recorder, TelemetryEvent, TelemetrySink};
pub use timer::{Timer, TimerEvent};
