// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered configuration: model, validation, and the atomic YAML store.

mod model;
mod store;

pub use model::{
    apply_updates, AgentsConfig, AgentsPatch, ConfigPatch, EventsConfig, EventsPatch,
    ExecutionConfig, ExecutionPatch, GeneralConfig, GeneralPatch, QuorumConfig, KNOWN_CLIS,
    LOG_LEVELS,
};
pub use store::{etag_of, ConfigStore, ConfigUpdate};

use thiserror::Error;

/// Errors from config reads, writes, and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
