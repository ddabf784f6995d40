// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem path validation against a project root.
//!
//! Every user-supplied path (attachments, task output files, browse requests)
//! passes through here before it touches the filesystem. Rejects traversal,
//! absolute paths, symlink escapes, and sensitive-file patterns.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Why a path request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("access to {0} is forbidden")]
    Forbidden(String),

    #[error("path {0} is not within the project root")]
    NotWithinRoot(String),
}

/// Segment names that are never served, regardless of location.
const FORBIDDEN_NAMES: &[&str] = &[".git", ".quorum", ".ssh"];

/// Private key file names.
const KEY_NAMES: &[&str] = &["id_rsa", "id_dsa", "id_ecdsa", "id_ed25519"];

/// Key-material file extensions.
const KEY_EXTENSIONS: &[&str] = &["pem", "key", "p12", "pfx"];

/// Validates requested paths against a single project root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative request into an absolute canonical path within the
    /// root, or refuse.
    ///
    /// Non-existent targets are accepted (so missing directories can be
    /// browsed and output files created), but their deepest existing ancestor
    /// must still resolve inside the root. Any unexpected filesystem error
    /// fails closed.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        let cleaned = self.clean(requested)?;

        let root_real = self
            .root
            .canonicalize()
            .map_err(|_| SandboxError::NotWithinRoot(requested.to_string()))?;
        let candidate = root_real.join(&cleaned);

        if candidate.exists() {
            let real = candidate
                .canonicalize()
                .map_err(|_| SandboxError::NotWithinRoot(requested.to_string()))?;
            if !real.starts_with(&root_real) {
                return Err(SandboxError::NotWithinRoot(requested.to_string()));
            }
            return Ok(real);
        }

        // Target absent: verify the deepest existing ancestor still resolves
        // inside the root, then accept the constructed path.
        let mut ancestor = candidate.clone();
        while !ancestor.exists() {
            match ancestor.parent() {
                Some(parent) => ancestor = parent.to_path_buf(),
                None => return Err(SandboxError::NotWithinRoot(requested.to_string())),
            }
        }
        let ancestor_real = ancestor
            .canonicalize()
            .map_err(|_| SandboxError::NotWithinRoot(requested.to_string()))?;
        if !ancestor_real.starts_with(&root_real) {
            return Err(SandboxError::NotWithinRoot(requested.to_string()));
        }
        Ok(candidate)
    }

    /// Syntactic validation: reject absolute paths, volume/UNC prefixes,
    /// parent-directory segments, and forbidden names. Returns the cleaned
    /// relative path.
    fn clean(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        if requested.starts_with('/') || requested.starts_with('\\') || has_volume_prefix(requested)
        {
            return Err(SandboxError::InvalidPath(requested.to_string()));
        }

        let mut cleaned = PathBuf::new();
        for component in Path::new(requested).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(SandboxError::InvalidPath(requested.to_string()));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SandboxError::InvalidPath(requested.to_string()));
                }
                Component::Normal(seg) => {
                    let seg_str = seg.to_string_lossy();
                    if is_forbidden_segment(&seg_str) {
                        return Err(SandboxError::Forbidden(requested.to_string()));
                    }
                    cleaned.push(seg);
                }
            }
        }
        Ok(cleaned)
    }
}

fn has_volume_prefix(requested: &str) -> bool {
    let bytes = requested.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

fn is_forbidden_segment(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    if FORBIDDEN_NAMES.contains(&lower.as_str()) || KEY_NAMES.contains(&lower.as_str()) {
        return true;
    }
    if lower == ".env" || lower.starts_with(".env.") {
        return true;
    }
    if let Some((_, ext)) = lower.rsplit_once('.') {
        if KEY_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
