// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project context carried through every lifecycle and task operation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

crate::wire_enum! {
    /// How configuration is resolved for a project.
    pub enum ConfigMode {
        /// Use the user-global configuration file.
        InheritGlobal => "inherit_global",
        /// Use `<project_root>/.quorum/config.yaml`.
        Custom => "custom",
    }
}

/// Request-scoped project identity.
///
/// Every lifecycle and task operation requires one; the HTTP layer resolves it
/// from the `?project=` query parameter before handlers run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_id: String,
    pub project_root: PathBuf,
    /// `None` means "infer from whether the project config file exists".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_mode: Option<ConfigMode>,
}

impl ProjectContext {
    pub fn new(project_id: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_id: project_id.into(),
            project_root: project_root.into(),
            config_mode: None,
        }
    }

    pub fn with_config_mode(mut self, mode: ConfigMode) -> Self {
        self.config_mode = Some(mode);
        self
    }

    /// Root of the per-project data directory.
    pub fn quorum_dir(&self) -> PathBuf {
        self.project_root.join(".quorum")
    }

    /// Path of the per-project configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.quorum_dir().join("config.yaml")
    }

    /// Path of the persisted workflow state file.
    pub fn state_path(&self) -> PathBuf {
        self.quorum_dir().join("state").join("state.json")
    }

    /// Directory holding attachments for one workflow.
    pub fn attachments_dir(&self, workflow_id: &str) -> PathBuf {
        self.quorum_dir().join("attachments").join("workflows").join(workflow_id)
    }

    /// Resolve the effective config mode, inferring from the filesystem when
    /// unset: `custom` when the project config file exists, `inherit_global`
    /// otherwise.
    pub fn effective_config_mode(&self) -> ConfigMode {
        match self.config_mode {
            Some(mode) => mode,
            None => {
                if self.config_path().exists() {
                    ConfigMode::Custom
                } else {
                    ConfigMode::InheritGlobal
                }
            }
        }
    }

    /// Create the standard `.quorum` directory layout under the project root.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        let base = self.quorum_dir();
        for sub in ["state", "attachments/workflows", "traces", "crashdumps", "runs"] {
            std::fs::create_dir_all(base.join(sub))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.project_root
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
