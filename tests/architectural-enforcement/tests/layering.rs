//! Integration Test: Crate Layering
//!
//! `relay-core` is shared by the daemon and the TUI, so it must not pull in
//! either side's stack. The TUI reaches the relay over HTTP only.

use architectural_enforcement::{dependency_names, read_workspace_file};

const SERVER_CRATES: &[&str] = &["axum", "tower", "tower-http", "hyper"];
const TERMINAL_CRATES: &[&str] = &["ratatui", "crossterm"];

#[test]
fn test_core_has_no_server_or_ui_dependencies() {
    let manifest = read_workspace_file("relay/core/Cargo.toml");
    let deps = dependency_names(&manifest, "dependencies");
    assert!(!deps.is_empty(), "relay-core declares no dependencies?");

    let offending: Vec<&String> = deps
        .iter()
        .filter(|d| SERVER_CRATES.contains(&d.as_str()) || TERMINAL_CRATES.contains(&d.as_str()))
        .collect();
    assert!(offending.is_empty(), "relay-core depends on {offending:?}");
}

#[test]
fn test_daemon_has_no_terminal_dependencies() {
    let manifest = read_workspace_file("relay/daemon/Cargo.toml");
    let deps = dependency_names(&manifest, "dependencies");
    for crate_name in TERMINAL_CRATES {
        assert!(
            !deps.iter().any(|d| d == crate_name),
            "relay-daemon depends on {crate_name}"
        );
    }
}

#[test]
fn test_tui_talks_to_relay_over_http_only() {
    let manifest = read_workspace_file("tui/Cargo.toml");
    let deps = dependency_names(&manifest, "dependencies");

    assert!(!deps.iter().any(|d| d == "relay-daemon"));
    for crate_name in SERVER_CRATES {
        assert!(
            !deps.iter().any(|d| d == crate_name),
            "tutor-tui depends on {crate_name} outside dev-dependencies"
        );
    }
}
