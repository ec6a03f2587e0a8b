//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Code that runs on the tokio runtime MUST NOT block.
//! **Required**: `tokio::fs`, `tokio::time::sleep`, async `reqwest`.
//!
//! Allowed exceptions:
//! - `main.rs` files (setup before or around the runtime)
//! - `relay/core/src/config.rs` (configuration is read once at startup)
//! - Test code

use std::fs;
use std::path::Path;

use architectural_enforcement::{production_lines, rust_sources, workspace_root};

const CHECKED_DIRS: &[&str] = &["relay/core/src", "relay/daemon/src", "tui/src"];

const STARTUP_ONLY: &[&str] = &["relay/core/src/config.rs"];

const FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs", "Blocking file I/O"),
    ("std::net::TcpStream", "Blocking network I/O"),
    ("std::net::TcpListener", "Blocking network I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::thread::sleep", "Thread sleep"),
    ("thread::sleep(", "Thread sleep"),
];

fn is_exempt(path: &Path) -> bool {
    let root = workspace_root();
    let relative = path.strip_prefix(&root).unwrap_or(path);
    relative.file_name().is_some_and(|name| name == "main.rs")
        || STARTUP_ONLY.iter().any(|allowed| relative == Path::new(allowed))
}

fn find_violations() -> Vec<String> {
    let mut violations = Vec::new();
    for dir in CHECKED_DIRS {
        for path in rust_sources(dir) {
            if is_exempt(&path) {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line_number, code) in production_lines(&content) {
                for (pattern, kind) in FORBIDDEN {
                    if code.contains(pattern) {
                        violations.push(format!("{}:{line_number} - {kind}: {code}", path.display()));
                    }
                }
            }
        }
    }
    violations
}

#[test]
fn test_sources_are_scanned() {
    for dir in CHECKED_DIRS {
        assert!(!rust_sources(dir).is_empty(), "no sources found under {dir}");
    }
}

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_violations();

    if !violations.is_empty() {
        eprintln!("\nBlocking calls found on async paths:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::fs, tokio::time::sleep and async reqwest instead.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}
