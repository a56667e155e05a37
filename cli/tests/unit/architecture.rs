//! Structural tests for layer boundaries.
//!
//! These tests scan source files to verify that `domain/` stays pure,
//! `application/` talks to the outside world only through its ports, and
//! `infra/` never reaches back into presentation code.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn src_dir(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-comment lines outside `#[cfg(test)]` blocks, with 1-based line numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            let comment =
                trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*');
            (!in_test && !comment).then(|| (i + 1, line.to_string()))
        })
        .collect()
}

/// Every production line in `layer` containing one of `needles`.
fn find_in_layer(layer: &str, needles: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir(layer)) {
        let rel = relative(&file);
        for (lineno, line) in production_lines(&file) {
            if let Some(needle) = needles.iter().find(|n| line.contains(*n)) {
                violations.push(format!("{rel}:{lineno}: `{needle}`: {}", line.trim()));
            }
        }
    }
    violations
}

// ── Domain purity ─────────────────────────────────────────────────────────────

#[test]
fn domain_has_no_outer_layer_or_io_imports() {
    let violations = find_in_layer(
        "domain",
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "crate::app::",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

// ── Application boundaries ────────────────────────────────────────────────────

#[test]
fn application_has_no_infra_output_or_command_imports() {
    let violations = find_in_layer(
        "application",
        &["crate::infra", "crate::output", "crate::commands", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must not import from infra/, output/ or commands/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_does_no_direct_io() {
    let violations = find_in_layer(
        "application",
        &[
            "std::fs",
            "tokio::fs",
            "std::process::Command",
            "tokio::process::Command",
            "std::net",
            "tokio::net",
            "println!",
            "eprintln!",
        ],
    );
    assert!(
        violations.is_empty(),
        "application/ must go through its ports for I/O and reporting:\n{}",
        violations.join("\n")
    );
}

// ── Infra boundaries ──────────────────────────────────────────────────────────

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_in_layer("infra", &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_in_layer("infra", &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_tokio_command_runner_new_outside_infra() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations = Vec::new();
    for file in collect_rs_files(&src) {
        let rel = relative(&file);
        if rel.contains("/infra/") {
            continue;
        }
        for (lineno, line) in production_lines(&file) {
            if line.contains("TokioCommandRunner::new") {
                violations.push(format!("{rel}:{lineno}: {}", line.trim()));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "TokioCommandRunner::new outside infra/, go through SystemHost:\n{}",
        violations.join("\n")
    );
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[test]
fn command_handlers_accept_app_context() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let has_handler = content.contains("pub async fn run(") || content.contains("pub fn run(");
        if has_handler && !content.contains("app: &AppContext") {
            violations.push(relative(&file));
        }
    }
    assert!(
        violations.is_empty(),
        "Command handlers must accept `app: &AppContext`:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_json_flag_parameters_in_commands() {
    let violations = find_in_layer("commands", &["json: bool"]);
    assert!(
        violations.is_empty(),
        "Commands must ask `app.is_json()` instead of taking a json flag:\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_do_not_shell_out() {
    let violations = find_in_layer(
        "commands",
        &["std::process::Command", "tokio::process::Command", "CommandRequest::"],
    );
    assert!(
        violations.is_empty(),
        "commands/ must delegate process work to application services:\n{}",
        violations.join("\n")
    );
}

// ── Hygiene ───────────────────────────────────────────────────────────────────

/// No module-level `#![allow(dead_code)]` in domain/, application/, or infra/.
#[test]
fn no_module_level_dead_code_allows_in_layers() {
    let mut violations = Vec::new();
    for layer in ["domain", "application", "infra"] {
        for file in collect_rs_files(&src_dir(layer)) {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                if line.trim() == "#![allow(dead_code)]" {
                    violations.push(format!("{}:{}", relative(&file), i + 1));
                }
            }
        }
    }
    assert!(
        violations.is_empty(),
        "Module-level #![allow(dead_code)] found in architecture layers:\n{}",
        violations.join("\n")
    );
}
