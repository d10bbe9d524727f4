//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code (deadlines wait on an explicit instant)
//! - The session core stays free of terminal UI crates
//! - No unwrap()/expect() in production code
//!
//! The helpers below find the workspace sources and strip comments and
//! `#[cfg(test)]` modules so the checks only see production code.

use std::fs;
use std::path::{Path, PathBuf};

/// A line of production code that breaks a rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// The offending line, trimmed
    pub line: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line_number, self.line)
    }
}

/// Root of the workspace this crate belongs to
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Every `.rs` file under `dir` (relative to the workspace root)
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Code lines of a source file, up to its first `#[cfg(test)]`
///
/// Yields `(line_number, code)` with line comments removed.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .collect()
}

/// Lines of production code under `dir` for which `matches` holds
pub fn find_violations(dir: &str, matches: impl Fn(&str) -> bool) -> Vec<Violation> {
    let mut violations = Vec::new();

    for path in rust_files(dir) {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };

        for (line_number, code) in production_lines(&content) {
            if matches(code) {
                violations.push(Violation {
                    path: path.clone(),
                    line_number,
                    line: code.trim().to_string(),
                });
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// note\nfn b() {} // trailing\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}"), (2, ""), (3, "fn b() {} ")]);
    }

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }

    #[test]
    fn test_violation_display() {
        let v = Violation {
            path: PathBuf::from("src/a.rs"),
            line_number: 3,
            line: "x.unwrap();".to_string(),
        };
        assert_eq!(v.to_string(), "src/a.rs:3 - x.unwrap();");
    }
}
