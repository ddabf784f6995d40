// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration tree, defaults, validation, and partial updates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ConfigError;

/// CLI adapters the execution layer knows how to drive.
pub const KNOWN_CLIS: &[&str] = &["claude", "codex", "gemini", "cursor"];

/// Accepted log level names.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Full configuration tree. Two scopes exist (global and project); both use
/// the same shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    pub general: GeneralConfig,
    pub execution: ExecutionConfig,
    pub events: EventsConfig,
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub default_cli: String,
    pub default_model: String,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_cli: "claude".to_string(),
            default_model: String::new(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock budget for one run, seconds.
    pub execution_timeout_secs: u64,
    /// Budget for the driver start confirmation, seconds.
    pub confirmation_timeout_secs: u64,
    /// How long force-stop waits for driver cleanup, seconds.
    pub force_stop_grace_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_enabled: bool,
    pub max_parallel_tasks: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            execution_timeout_secs: 4 * 60 * 60,
            confirmation_timeout_secs: 5,
            force_stop_grace_secs: 2,
            heartbeat_interval_secs: 30,
            heartbeat_enabled: true,
            max_parallel_tasks: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Per-subscriber event buffer capacity.
    pub buffer_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { buffer_capacity: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub enabled_clis: Vec<String>,
    /// Per-CLI model override, e.g. `claude -> opus`.
    pub model_overrides: HashMap<String, String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled_clis: KNOWN_CLIS.iter().map(|s| s.to_string()).collect(),
            model_overrides: HashMap::new(),
        }
    }
}

impl QuorumConfig {
    /// Schema validation run before every save; invalid configs never reach
    /// disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "general.log_level must be one of {LOG_LEVELS:?}, got {:?}",
                self.general.log_level
            )));
        }
        if !KNOWN_CLIS.contains(&self.general.default_cli.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "general.default_cli must be one of {KNOWN_CLIS:?}, got {:?}",
                self.general.default_cli
            )));
        }
        if self.execution.execution_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "execution.execution_timeout_secs must be positive".to_string(),
            ));
        }
        if self.execution.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "execution.confirmation_timeout_secs must be positive".to_string(),
            ));
        }
        if self.execution.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "execution.heartbeat_interval_secs must be positive".to_string(),
            ));
        }
        if self.execution.max_parallel_tasks == 0 || self.execution.max_parallel_tasks > 64 {
            return Err(ConfigError::Invalid(
                "execution.max_parallel_tasks must be between 1 and 64".to_string(),
            ));
        }
        if self.events.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events.buffer_capacity must be positive".to_string(),
            ));
        }
        if self.agents.enabled_clis.is_empty() {
            return Err(ConfigError::Invalid(
                "agents.enabled_clis cannot be empty".to_string(),
            ));
        }
        for cli in &self.agents.enabled_clis {
            if !KNOWN_CLIS.contains(&cli.as_str()) {
                return Err(ConfigError::Invalid(format!("unknown cli in agents.enabled_clis: {cli:?}")));
            }
        }
        Ok(())
    }
}

/// Partial update of the configuration tree. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub general: Option<GeneralPatch>,
    pub execution: Option<ExecutionPatch>,
    pub events: Option<EventsPatch>,
    pub agents: Option<AgentsPatch>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.general.is_none()
            && self.execution.is_none()
            && self.events.is_none()
            && self.agents.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralPatch {
    pub default_cli: Option<String>,
    pub default_model: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionPatch {
    pub execution_timeout_secs: Option<u64>,
    pub confirmation_timeout_secs: Option<u64>,
    pub force_stop_grace_secs: Option<u64>,
    pub heartbeat_interval_secs: Option<u64>,
    pub heartbeat_enabled: Option<bool>,
    pub max_parallel_tasks: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsPatch {
    pub buffer_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentsPatch {
    pub enabled_clis: Option<Vec<String>>,
    pub model_overrides: Option<HashMap<String, String>>,
}

/// Apply a partial update in place. An empty patch is a no-op.
pub fn apply_updates(config: &mut QuorumConfig, patch: &ConfigPatch) {
    if let Some(general) = &patch.general {
        if let Some(v) = &general.default_cli {
            config.general.default_cli = v.clone();
        }
        if let Some(v) = &general.default_model {
            config.general.default_model = v.clone();
        }
        if let Some(v) = &general.log_level {
            config.general.log_level = v.clone();
        }
    }
    if let Some(execution) = &patch.execution {
        if let Some(v) = execution.execution_timeout_secs {
            config.execution.execution_timeout_secs = v;
        }
        if let Some(v) = execution.confirmation_timeout_secs {
            config.execution.confirmation_timeout_secs = v;
        }
        if let Some(v) = execution.force_stop_grace_secs {
            config.execution.force_stop_grace_secs = v;
        }
        if let Some(v) = execution.heartbeat_interval_secs {
            config.execution.heartbeat_interval_secs = v;
        }
        if let Some(v) = execution.heartbeat_enabled {
            config.execution.heartbeat_enabled = v;
        }
        if let Some(v) = execution.max_parallel_tasks {
            config.execution.max_parallel_tasks = v;
        }
    }
    if let Some(events) = &patch.events {
        if let Some(v) = events.buffer_capacity {
            config.events.buffer_capacity = v;
        }
    }
    if let Some(agents) = &patch.agents {
        if let Some(v) = &agents.enabled_clis {
            config.agents.enabled_clis = v.clone();
        }
        if let Some(v) = &agents.model_overrides {
            config.agents.model_overrides = v.clone();
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
