// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

/// Env/flag-driven configuration for one countdown run.
#[derive(Debug, Clone, Parser)]
#[command(name = "mortality", version, about = "Countdown-driven multi-agent runtime.")]
pub struct EmergentConfig {
    /// LLM provider backing every spawned agent.
    #[arg(long, env = "MORTALITY_EMERGENT_PROVIDER", default_value = "openrouter")]
    pub provider: String,

    /// Comma-separated model identifiers, one per agent (before replicas).
    #[arg(long, env = "MORTALITY_EMERGENT_MODELS", default_value = "")]
    pub models: String,

    /// Number of agent replicas spawned per model. Must be exactly 1.
    #[arg(long, env = "MORTALITY_REPLICAS_PER_MODEL", default_value = "1")]
    pub replicas_per_model: u32,

    /// Earliest countdown duration, in minutes.
    #[arg(long, env = "MORTALITY_EMERGENT_SPREAD_START", default_value = "5")]
    pub spread_start: u64,

    /// Latest countdown duration, in minutes.
    #[arg(long, env = "MORTALITY_EMERGENT_SPREAD_END", default_value = "15")]
    pub spread_end: u64,

    /// Minimum seconds between ticks.
    #[arg(long, env = "OPENROUTER_TICK_SECONDS", default_value = "20")]
    pub tick_seconds: f64,

    /// Maximum seconds between ticks.
    #[arg(long, env = "OPENROUTER_TICK_SECONDS_MAX", default_value = "40")]
    pub tick_seconds_max: f64,

    /// Enable the optional WebSocket dashboard sink.
    #[arg(long, env = "MORTALITY_LIVE_DASHBOARD")]
    pub live_dashboard: bool,

    /// Port the dashboard sink listens on, when enabled.
    #[arg(long, env = "MORTALITY_WS_PORT", default_value = "8765")]
    pub ws_port: u16,
}

impl EmergentConfig {
    /// Validate cross-field constraints after parsing. Credential presence
    /// is checked separately in `run::run`, since it depends on the
    /// process environment rather than this struct's own fields.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.replicas_per_model != 1 {
            anyhow::bail!("--replicas-per-model must be 1");
        }
        if self.spread_end < self.spread_start {
            anyhow::bail!("--spread-end must be >= --spread-start");
        }
        if self.tick_seconds <= 0.0 {
            anyhow::bail!("--tick-seconds must be > 0");
        }
        if self.tick_seconds_max < self.tick_seconds {
            anyhow::bail!("--tick-seconds-max must be >= --tick-seconds");
        }

        if self.provider != "mock" {
            let unique: std::collections::HashSet<&str> =
                self.models.split(',').map(str::trim).filter(|m| !m.is_empty()).collect();
            if unique.len() < 4 {
                anyhow::bail!("--models must list at least 4 unique models unless --provider=mock");
            }
        }

        Ok(())
    }

    /// Parsed, deduplicated model list.
    pub fn model_list(&self) -> Vec<String> {
        self.models.split(',').map(str::trim).filter(|m| !m.is_empty()).map(str::to_owned).collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
