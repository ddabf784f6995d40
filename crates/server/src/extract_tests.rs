// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::http::Request;

fn parts_for(uri: &str) -> axum::http::request::Parts {
    let (parts, ()) = Request::builder().uri(uri).body(()).expect("request").into_parts();
    parts
}

#[test]
fn project_param_is_extracted() {
    assert_eq!(project_param(&parts_for("/x?project=alpha")), Some("alpha".to_string()));
    assert_eq!(
        project_param(&parts_for("/x?foo=1&project=beta&bar=2")),
        Some("beta".to_string())
    );
}

#[test]
fn missing_or_empty_param_is_none() {
    assert_eq!(project_param(&parts_for("/x")), None);
    assert_eq!(project_param(&parts_for("/x?project=")), None);
    assert_eq!(project_param(&parts_for("/x?projection=1")), None);
}
