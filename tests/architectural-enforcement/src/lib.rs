//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce the workspace layout:
//! - No blocking I/O or sleeps on the async paths
//! - `relay-core` stays free of server and terminal UI crates
//! - The TUI talks to the relay over HTTP only
//!
//! The helpers here scan source files and manifests relative to the
//! workspace root so the tests work from any working directory.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// All `.rs` files under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Production lines of a source file as `(line_number, code)`
///
/// Stops at the first `#[cfg(test)]`; test modules sit at the end of files.
/// Line comments are stripped.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, String)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter_map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line).trim();
            (!code.is_empty()).then(|| (idx + 1, code.to_string()))
        })
        .collect()
}

/// Crate names declared in one `[section]` of a manifest
#[must_use]
pub fn dependency_names(manifest: &str, section: &str) -> Vec<String> {
    let header = format!("[{section}]");
    let mut in_section = false;
    let mut names = Vec::new();
    for line in manifest.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line == header;
            continue;
        }
        if !in_section || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

/// Read a file relative to the workspace root
///
/// # Panics
///
/// Panics if the file cannot be read; these are test helpers.
#[must_use]
pub fn read_workspace_file(relative: &str) -> String {
    let path = workspace_root().join(relative);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_tests() {
        let source = "use std::fs; // sync\nfn a() {}\n#[cfg(test)]\nmod tests { use std::fs; }\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "use std::fs;".to_string()), (2, "fn a() {}".to_string())]);
    }

    #[test]
    fn test_dependency_names() {
        let manifest = "[package]\nname = \"x\"\n\n[dependencies]\n# comment\ntokio = \"1\"\nserde = { version = \"1\" }\n\n[dev-dependencies]\naxum = \"0.7\"\n";
        assert_eq!(dependency_names(manifest, "dependencies"), vec!["tokio", "serde"]);
        assert_eq!(dependency_names(manifest, "dev-dependencies"), vec!["axum"]);
    }
}
