// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{ConfigPatch, EventsPatch, GeneralPatch};

fn store_in(dir: &tempfile::TempDir) -> (ConfigStore, PathBuf) {
    let global = dir.path().join("global/config.yaml");
    (ConfigStore::new(&global), global)
}

#[test]
fn etag_is_a_sha256_prefix() {
    let etag = etag_of(b"hello");
    // 16 bytes of hash, hex-encoded
    assert_eq!(etag.len(), 32);
    assert!(etag.chars().all(|c| c.is_ascii_hexdigit()));
    // Stable for identical input, different for different input
    assert_eq!(etag, etag_of(b"hello"));
    assert_ne!(etag, etag_of(b"hello!"));
}

#[test]
fn missing_file_reads_defaults_with_canonical_etag() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);

    let (config, etag) = store.read(&path).unwrap();
    assert_eq!(config, QuorumConfig::default());

    let canonical = serde_yaml::to_string(&QuorumConfig::default()).unwrap();
    assert_eq!(etag, etag_of(canonical.as_bytes()));
}

#[test]
fn write_then_read_agrees_on_etag() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);

    let mut config = QuorumConfig::default();
    config.general.log_level = "debug".to_string();
    let written_etag = store.write(&path, &config).unwrap();

    let (read_back, read_etag) = store.read(&path).unwrap();
    assert_eq!(read_back, config);
    assert_eq!(read_etag, written_etag);
}

#[test]
fn etag_roundtrips_through_parse_and_marshal() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();

    // Canonical bytes: parse then marshal reproduces them exactly.
    let bytes = std::fs::read(&path).unwrap();
    let parsed: QuorumConfig = serde_yaml::from_slice(&bytes).unwrap();
    let remarshalled = serde_yaml::to_string(&parsed).unwrap();
    assert_eq!(etag_of(remarshalled.as_bytes()), etag_of(&bytes));
}

#[test]
fn invalid_config_never_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);

    let mut config = QuorumConfig::default();
    config.general.log_level = "shouting".to_string();
    assert!(matches!(store.write(&path, &config), Err(ConfigError::Invalid(_))));
    assert!(!path.exists());
}

#[cfg(unix)]
#[test]
fn written_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn update_with_matching_etag_applies() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();
    let (_, etag) = store.read(&path).unwrap();

    let patch = ConfigPatch {
        events: Some(EventsPatch { buffer_capacity: Some(42) }),
        ..Default::default()
    };
    match store.update(&path, &patch, Some(&etag), false).unwrap() {
        ConfigUpdate::Applied { config, .. } => assert_eq!(config.events.buffer_capacity, 42),
        ConfigUpdate::Conflict { .. } => panic!("expected apply"),
    }
}

#[test]
fn update_with_stale_etag_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();
    let (_, old_etag) = store.read(&path).unwrap();

    // External writer rewrites the file underneath us.
    let mut external = QuorumConfig::default();
    external.general.log_level = "warn".to_string();
    store.write(&path, &external).unwrap();
    let (_, current_etag) = store.read(&path).unwrap();

    let patch = ConfigPatch {
        general: Some(GeneralPatch { log_level: Some("error".to_string()), ..Default::default() }),
        ..Default::default()
    };
    match store.update(&path, &patch, Some(&old_etag), false).unwrap() {
        ConfigUpdate::Conflict { config, etag } => {
            assert_eq!(etag, current_etag);
            assert_eq!(config.general.log_level, "warn");
        }
        ConfigUpdate::Applied { .. } => panic!("expected conflict"),
    }
    // The losing patch must not have landed.
    let (unchanged, _) = store.read(&path).unwrap();
    assert_eq!(unchanged.general.log_level, "warn");
}

#[test]
fn force_bypasses_the_etag_check() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();

    let patch = ConfigPatch {
        general: Some(GeneralPatch { log_level: Some("error".to_string()), ..Default::default() }),
        ..Default::default()
    };
    match store.update(&path, &patch, Some("definitely-stale"), true).unwrap() {
        ConfigUpdate::Applied { config, .. } => assert_eq!(config.general.log_level, "error"),
        ConfigUpdate::Conflict { .. } => panic!("force must bypass"),
    }
}

#[test]
fn empty_if_match_always_matches() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);

    let patch = ConfigPatch {
        events: Some(EventsPatch { buffer_capacity: Some(7) }),
        ..Default::default()
    };
    // First save: no file, no etag expectation.
    match store.update(&path, &patch, Some(""), false).unwrap() {
        ConfigUpdate::Applied { config, .. } => assert_eq!(config.events.buffer_capacity, 7),
        ConfigUpdate::Conflict { .. } => panic!("empty if-match must match"),
    }
    assert!(path.exists());
}

#[test]
fn quoted_if_match_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();
    let (_, etag) = store.read(&path).unwrap();

    let quoted = format!("\"{etag}\"");
    let patch = ConfigPatch::default();
    assert!(matches!(
        store.update(&path, &patch, Some(&quoted), false).unwrap(),
        ConfigUpdate::Applied { .. }
    ));
}

#[test]
fn reset_restores_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    let mut config = QuorumConfig::default();
    config.events.buffer_capacity = 9;
    store.write(&path, &config).unwrap();

    let (reset_config, _) = store.reset(&path).unwrap();
    assert_eq!(reset_config, QuorumConfig::default());
    let (on_disk, _) = store.read(&path).unwrap();
    assert_eq!(on_disk, QuorumConfig::default());
}

#[test]
fn effective_path_follows_config_mode() {
    let dir = tempfile::tempdir().unwrap();
    let (store, global) = store_in(&dir);
    let project_root = dir.path().join("project");
    std::fs::create_dir_all(&project_root).unwrap();

    let ctx = qm_core::ProjectContext::new("p", &project_root);
    // No project file: inherit global
    assert_eq!(store.effective_path(&ctx), global);

    // Project file appears: custom
    std::fs::create_dir_all(project_root.join(".quorum")).unwrap();
    std::fs::write(project_root.join(".quorum/config.yaml"), "general: {}\n").unwrap();
    assert_eq!(store.effective_path(&ctx), project_root.join(".quorum/config.yaml"));
}

#[test]
fn no_temp_file_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.write(&path, &QuorumConfig::default()).unwrap();

    let entries: Vec<String> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["config.yaml".to_string()]);
}
