//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layering holds:
//! domain is pure, application talks to the world only through ports,
//! and commands render through `app.renderer()`.

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

/// Non-comment lines outside `#[cfg(test)]` blocks, with line numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::default();
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !tracker.process_line(line))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(|(i, line)| (i + 1, line.to_string()))
        .collect()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
#[derive(Default)]
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        let inside = self.in_test_block;
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
        inside
    }
}

fn src(sub: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(sub)
}

fn violations(dir: &Path, forbidden: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for file in collect_rs_files(dir) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (lineno, line) in production_lines(&file) {
            if let Some(pattern) = forbidden.iter().find(|p| line.contains(*p)) {
                found.push(format!("{rel}:{lineno}: `{pattern}` in: {}", line.trim()));
            }
        }
    }
    found
}

// ── Domain is pure ────────────────────────────────────────────────────────────

#[test]
fn domain_has_no_io_or_outer_layer_imports() {
    let found = violations(
        &src("domain"),
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio::",
            "reqwest",
            "std::fs::",
            "std::process::",
        ],
    );
    assert!(
        found.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        found.join("\n")
    );
}

// ── Application goes through ports ────────────────────────────────────────────

#[test]
fn application_does_not_import_infra_or_presentation() {
    let found = violations(
        &src("application"),
        &[
            "crate::infra",
            "crate::commands",
            "crate::output",
            "reqwest",
            "println!",
            "eprintln!",
        ],
    );
    assert!(
        found.is_empty(),
        "application/ must only use domain and ports:\n{}",
        found.join("\n")
    );
}

// ── Commands render through the renderer ──────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut found = Vec::new();
    for file in collect_rs_files(&src("commands")) {
        for (lineno, line) in production_lines(&file) {
            let trimmed = line.trim();
            if line.contains("json: bool")
                || trimmed.starts_with("if json")
                || trimmed.starts_with("if !json")
                || trimmed.contains("serde_json::to_string")
            {
                found.push(format!("{}:{lineno}: {trimmed}", file.display()));
            }
        }
    }
    assert!(
        found.is_empty(),
        "Found inline JSON handling in commands/: use app.renderer() instead:\n{}",
        found.join("\n")
    );
}

#[test]
fn production_runners_are_built_only_in_the_composition_root() {
    let mut found = Vec::new();
    for file in collect_rs_files(&src("")) {
        let rel = file.display().to_string().replace('\\', "/");
        if rel.contains("/infra/") || rel.ends_with("app.rs") {
            continue;
        }
        for (lineno, line) in production_lines(&file) {
            for ctor in [
                "TokioCommandRunner::",
                "ReqwestTransport::new",
                "FileCredentialStore::new",
                "FileLock::new",
            ] {
                if line.contains(ctor) {
                    found.push(format!("{rel}:{lineno}: {}", line.trim()));
                }
            }
        }
    }
    assert!(
        found.is_empty(),
        "Production ports must be constructed in AppContext only:\n{}",
        found.join("\n")
    );
}
