//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in production code MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::io`, async `reqwest`; never `std::fs`,
//! `std::net`, `std::process::Command` or `reqwest::blocking` on the runtime.
//! **Allowed**: blocking calls in plain (non-async) functions, and test code.

use architectural_enforcement::{production_files, Enclosing, SourceFile};

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let violations: Vec<String> = production_files()
        .iter()
        .flat_map(find_blocking_io)
        .collect();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O calls found in async production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::fs / tokio::io instead, or move the call into a sync fn.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

/// Test that nothing imports `std::fs` or `std::net` wholesale
///
/// A module-level import hides which functions use it, so blocking calls
/// must be spelled out in full inside sync functions.
#[test]
fn test_no_module_level_blocking_imports() {
    let mut violations = Vec::new();

    for file in production_files() {
        for idx in 0..file.lines.len() {
            let code = file.code(idx).trim();
            if (code.starts_with("use std::fs") || code.starts_with("use std::net"))
                && !file.is_test_code(idx)
            {
                violations.push(file.violation(idx, "Blocking import"));
            }
        }
    }

    assert!(violations.is_empty(), "{violations:#?}");
}

fn find_blocking_io(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();

    for idx in 0..file.lines.len() {
        let code = file.code(idx);
        if code.trim().is_empty() || file.is_test_code(idx) {
            continue;
        }
        if file.enclosing_fn(idx) != Enclosing::AsyncFn {
            continue;
        }

        if code.contains("std::fs::") {
            violations.push(file.violation(idx, "Blocking file I/O"));
        }
        if code.contains("std::net::") {
            violations.push(file.violation(idx, "Blocking network I/O"));
        }
        if code.contains("std::process::Command") {
            violations.push(file.violation(idx, "Blocking process I/O"));
        }
        if code.contains("reqwest::blocking") {
            violations.push(file.violation(idx, "Blocking HTTP client"));
        }
        if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
            violations.push(file.violation(idx, "Blocking stdin/stdout"));
        }
        if code.contains("std::thread::sleep") {
            violations.push(file.violation(idx, "Blocking sleep"));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(lines: &[&str]) -> SourceFile {
        SourceFile::new(PathBuf::from("x.rs"), &lines.join("\n"))
    }

    #[test]
    fn test_blocking_io_detection() {
        let src = file(&[
            "pub async fn load(&self) {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ]);

        assert_eq!(find_blocking_io(&src).len(), 1);
    }

    #[test]
    fn test_sync_function_is_allowed() {
        let src = file(&[
            "pub fn load(&self) {",
            "    let contents = std::fs::read_to_string(\"config.toml\")?;",
            "}",
        ]);

        assert!(find_blocking_io(&src).is_empty());
    }

    #[test]
    fn test_test_function_is_allowed() {
        let src = file(&[
            "#[tokio::test]",
            "async fn test_something() {",
            "    std::fs::write(\"test.txt\", \"\").unwrap();",
            "}",
        ]);

        assert!(find_blocking_io(&src).is_empty());
    }
}
