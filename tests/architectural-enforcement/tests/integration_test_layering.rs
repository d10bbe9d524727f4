//! Integration Test: Layering
//!
//! **Policy**: `webserve-core` is headless. It must not depend on or import
//! terminal UI crates, so any surface can drive a session.
//! **Policy**: Production code propagates errors instead of calling
//! `unwrap()`/`expect()`.

use std::fs;

use architectural_enforcement::{find_violations, workspace_root};

const UI_CRATES: &[&str] = &["ratatui", "crossterm"];

#[test]
fn test_core_manifest_has_no_ui_crates() {
    let manifest = fs::read_to_string(workspace_root().join("client/core/Cargo.toml"))
        .expect("core manifest should exist");

    for krate in UI_CRATES {
        let declared = manifest
            .lines()
            .any(|line| line.trim_start().starts_with(&format!("{krate} ")));
        assert!(!declared, "webserve-core must not depend on {krate}");
    }
}

#[test]
fn test_core_sources_do_not_import_ui_crates() {
    let violations = find_violations("client/core/src", |code| {
        UI_CRATES.iter().any(|krate| code.contains(&format!("{krate}::")))
    });

    assert!(
        violations.is_empty(),
        "UI crate used in webserve-core:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[test]
fn test_no_unwrap_in_production_code() {
    let is_panicking_call = |code: &str| code.contains(".unwrap()") || code.contains(".expect(");

    let mut violations = find_violations("client/core/src", is_panicking_call);
    violations.extend(find_violations("tui/src", is_panicking_call));

    assert!(
        violations.is_empty(),
        "unwrap()/expect() in production code:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}
