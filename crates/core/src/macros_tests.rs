// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::task::TaskStatus;
use crate::workflow::{Phase, WorkflowStatus};

#[test]
fn all_lists_every_variant_in_order() {
    assert_eq!(WorkflowStatus::ALL.len(), 6);
    assert_eq!(WorkflowStatus::ALL[0], WorkflowStatus::Pending);
    assert_eq!(Phase::ALL.len(), 4);
    assert_eq!(TaskStatus::ALL.len(), 5);
}

#[test]
fn as_str_matches_serde_encoding() {
    for status in WorkflowStatus::ALL {
        let json = serde_json::to_string(status).unwrap();
        assert_eq!(json, format!("\"{}\"", status.as_str()));
    }
    for phase in Phase::ALL {
        let json = serde_json::to_string(phase).unwrap();
        assert_eq!(json, format!("\"{}\"", phase.as_str()));
    }
}

#[test]
fn parse_inverts_as_str() {
    for status in WorkflowStatus::ALL {
        assert_eq!(WorkflowStatus::parse(status.as_str()), Some(*status));
    }
    assert_eq!(WorkflowStatus::parse("sideways"), None);
}

#[test]
fn display_uses_the_wire_name() {
    assert_eq!(WorkflowStatus::AwaitingReview.to_string(), "awaiting_review");
    assert_eq!(Phase::Analyze.to_string(), "analyze");
    assert_eq!(TaskStatus::Skipped.to_string(), "skipped");
}
