//! Integration Test: Sleep Prohibition
//!
//! **Policy**: production code MUST NOT sleep. Streaming is driven by
//! awaiting the next chunk or input, never by polling on a timer.
//! **Exceptions**: exponential backoff in retry logic, and test code.

use architectural_enforcement::{production_files, SourceFile};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = production_files()
        .iter()
        .flat_map(find_sleep_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nAcceptable: exponential backoff in retry logic, test code.");
        eprintln!("Forbidden: sleep in polling loops or as synchronization.");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

fn find_sleep_violations(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();

    for idx in 0..file.lines.len() {
        let code = file.code(idx);
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }
        if file.is_test_code(idx) || is_backoff_context(&file.lines, idx) {
            continue;
        }
        violations.push(file.violation(idx, "Sleep"));
    }

    violations
}

/// Check if sleep is used for exponential backoff (acceptable for retry logic)
fn is_backoff_context(lines: &[String], current_idx: usize) -> bool {
    let context = current_idx.saturating_sub(15)..std::cmp::min(current_idx + 5, lines.len());

    let mut has_backoff_calc = false;
    let mut has_retry_context = false;

    for line in &lines[context] {
        let line = line.to_lowercase();

        if line.contains("<<") || line.contains("pow") || line.contains("* 2") {
            has_backoff_calc = true;
        }
        if line.contains("retry")
            || line.contains("reconnect")
            || line.contains("backoff")
            || line.contains("attempt")
        {
            has_retry_context = true;
        }
    }

    has_backoff_calc && has_retry_context
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(lines: &[&str]) -> SourceFile {
        SourceFile::new(PathBuf::from("x.rs"), &lines.join("\n"))
    }

    #[test]
    fn test_sleep_violation_detection() {
        let src = file(&[
            "async fn poll_loop() {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ]);

        assert_eq!(find_sleep_violations(&src).len(), 1);
    }

    #[test]
    fn test_backoff_detection() {
        let src = file(&[
            "async fn reconnect() {",
            "    let delay = base_delay * (1 << attempt);",
            "    tracing::warn!(attempt, \"Retry\");",
            "    tokio::time::sleep(Duration::from_millis(delay)).await;",
            "}",
        ]);

        assert!(find_sleep_violations(&src).is_empty());
    }

    #[test]
    fn test_commented_sleep_is_ignored() {
        let src = file(&["fn f() {", "    // tokio::time::sleep(d).await;", "}"]);

        assert!(find_sleep_violations(&src).is_empty());
    }
}
