// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn paths_derive_from_root() {
    let ctx = ProjectContext::new("proj", "/work/demo");
    assert_eq!(ctx.quorum_dir(), Path::new("/work/demo/.quorum"));
    assert_eq!(ctx.config_path(), Path::new("/work/demo/.quorum/config.yaml"));
    assert_eq!(ctx.state_path(), Path::new("/work/demo/.quorum/state/state.json"));
    assert_eq!(
        ctx.attachments_dir("wf-1"),
        Path::new("/work/demo/.quorum/attachments/workflows/wf-1")
    );
}

#[test]
fn explicit_config_mode_wins() {
    let ctx = ProjectContext::new("proj", "/nonexistent-root")
        .with_config_mode(ConfigMode::Custom);
    assert_eq!(ctx.effective_config_mode(), ConfigMode::Custom);
}

#[test]
fn config_mode_inferred_from_project_file() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ProjectContext::new("proj", dir.path());
    // No project config file yet
    assert_eq!(ctx.effective_config_mode(), ConfigMode::InheritGlobal);

    std::fs::create_dir_all(ctx.quorum_dir()).unwrap();
    std::fs::write(ctx.config_path(), "general: {}\n").unwrap();
    assert_eq!(ctx.effective_config_mode(), ConfigMode::Custom);
}

#[test]
fn ensure_layout_creates_standard_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ProjectContext::new("proj", dir.path());
    ctx.ensure_layout().unwrap();

    for sub in ["state", "attachments/workflows", "traces", "crashdumps", "runs"] {
        assert!(ctx.quorum_dir().join(sub).is_dir(), "missing {sub}");
    }
}

#[test]
fn config_mode_display() {
    assert_eq!(ConfigMode::InheritGlobal.to_string(), "inherit_global");
    assert_eq!(ConfigMode::Custom.to_string(), "custom");
}
