// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn with_env<T>(pairs: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let saved: Vec<(String, Option<String>)> = pairs
        .iter()
        .map(|(key, _)| (key.to_string(), std::env::var(key).ok()))
        .collect();
    for (key, value) in pairs {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    let out = f();
    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(&key, v),
            None => std::env::remove_var(&key),
        }
    }
    out
}

#[test]
#[serial]
fn port_defaults_and_overrides() {
    with_env(&[("QUORUM_PORT", None)], || assert_eq!(port(), 8080));
    with_env(&[("QUORUM_PORT", Some("9999"))], || assert_eq!(port(), 9999));
    with_env(&[("QUORUM_PORT", Some("not-a-port"))], || assert_eq!(port(), 8080));
}

#[test]
#[serial]
fn global_config_env_override_wins() {
    with_env(&[("QUORUM_GLOBAL_CONFIG", Some("/tmp/custom.yaml"))], || {
        assert_eq!(global_config_path(), PathBuf::from("/tmp/custom.yaml"));
    });
    with_env(&[("QUORUM_GLOBAL_CONFIG", None)], || {
        let path = global_config_path();
        assert!(path.ends_with("quorum/config.yaml"), "{}", path.display());
    });
}

#[test]
#[serial]
fn http_timeout_parses_millis() {
    with_env(&[("QUORUM_HTTP_TIMEOUT_MS", Some("1500"))], || {
        assert_eq!(http_timeout(), Duration::from_millis(1500));
    });
    with_env(&[("QUORUM_HTTP_TIMEOUT_MS", None)], || {
        assert_eq!(http_timeout(), Duration::from_secs(60));
    });
}

#[test]
#[serial]
fn project_root_override() {
    with_env(&[("QUORUM_PROJECT_ROOT", Some("/srv/project"))], || {
        assert_eq!(project_root(), PathBuf::from("/srv/project"));
    });
}
