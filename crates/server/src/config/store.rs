// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic YAML persistence with content-hash ETags and conflict detection.
//!
//! Writers marshal into a temp file beside the target, fsync, chmod 0600,
//! rename over the target, and fsync the directory. A per-file lock
//! serializes writers in this process; the rename is the atomicity point for
//! everyone else.

use parking_lot::Mutex;
use qm_core::{ConfigMode, ProjectContext};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::model::{apply_updates, ConfigPatch, QuorumConfig};
use super::ConfigError;

/// ETag of a byte slice: hex of the first 16 bytes of its SHA-256.
pub fn etag_of(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Result of a conditional update.
pub enum ConfigUpdate {
    Applied { config: QuorumConfig, etag: String },
    /// If-Match lost; carries the current winner.
    Conflict { config: QuorumConfig, etag: String },
}

/// Reads and writes layered configuration files.
pub struct ConfigStore {
    global_path: PathBuf,
    write_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ConfigStore {
    pub fn new(global_path: impl Into<PathBuf>) -> Self {
        Self {
            global_path: global_path.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    /// File backing the effective config for a project context.
    pub fn effective_path(&self, ctx: &ProjectContext) -> PathBuf {
        match ctx.effective_config_mode() {
            ConfigMode::Custom => ctx.config_path(),
            ConfigMode::InheritGlobal => self.global_path.clone(),
        }
    }

    /// Load a config file with its ETag. A missing file yields defaults and
    /// the ETag of their canonical marshal.
    pub fn read(&self, path: &Path) -> Result<(QuorumConfig, String), ConfigError> {
        if path.exists() {
            let bytes = fs::read(path)?;
            let config: QuorumConfig = serde_yaml::from_slice(&bytes)?;
            Ok((config, etag_of(&bytes)))
        } else {
            let config = QuorumConfig::default();
            let bytes = serde_yaml::to_string(&config)?.into_bytes();
            Ok((config, etag_of(&bytes)))
        }
    }

    /// Validate and persist, returning the new ETag.
    pub fn write(&self, path: &Path, config: &QuorumConfig) -> Result<String, ConfigError> {
        config.validate()?;
        let lock = self.lock_for(path);
        let _guard = lock.lock();

        let bytes = serde_yaml::to_string(config)?.into_bytes();
        write_atomic(path, &bytes)?;
        info!(path = %path.display(), "config written");
        Ok(etag_of(&bytes))
    }

    /// Conditional partial update.
    ///
    /// `if_match` empty or absent means "first save, always matches";
    /// `force` bypasses the comparison entirely.
    pub fn update(
        &self,
        path: &Path,
        patch: &ConfigPatch,
        if_match: Option<&str>,
        force: bool,
    ) -> Result<ConfigUpdate, ConfigError> {
        let (mut config, current_etag) = self.read(path)?;

        if !force {
            if let Some(expected) = if_match.filter(|s| !s.is_empty()) {
                let expected = expected.trim_matches('"');
                if expected != current_etag {
                    return Ok(ConfigUpdate::Conflict { config, etag: current_etag });
                }
            }
        }

        apply_updates(&mut config, patch);
        let etag = self.write(path, &config)?;
        Ok(ConfigUpdate::Applied { config, etag })
    }

    /// Overwrite with defaults.
    pub fn reset(&self, path: &Path) -> Result<(QuorumConfig, String), ConfigError> {
        let config = QuorumConfig::default();
        let etag = self.write(path, &config)?;
        Ok((config, etag))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock();
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }
}

/// Temp file in the target's directory → fsync → chmod 0600 → rename →
/// fsync directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let tmp = path.with_extension("yaml.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
    }
    fs::rename(&tmp, path)?;
    if let Ok(dir) = fs::File::open(parent) {
        // Best-effort: some filesystems refuse directory fsync.
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
