//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the integration tests in `tests/`. They enforce:
//! - No sleep() calls in production code
//! - No blocking I/O inside async functions
//!
//! The scanners are line-based heuristics, not a parser. They understand
//! comments, function signatures (any visibility, `async` or not) and
//! `#[cfg(test)]` modules, which is enough for the code in this workspace.

use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["sidechat/core/src", "sidechat/cli/src"];

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// All `.rs` files under the production directories
///
/// # Panics
///
/// Panics if a production directory is missing, so a moved crate cannot
/// silently disable the checks.
#[must_use]
pub fn production_files() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        assert!(path.is_dir(), "production directory missing: {}", path.display());

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                if let Ok(content) = std::fs::read_to_string(entry.path()) {
                    files.push(SourceFile::new(entry.path().to_path_buf(), &content));
                }
            }
        }
    }

    files
}

/// Kind of function enclosing a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enclosing {
    /// Inside an `async fn`
    AsyncFn,
    /// Inside a plain `fn`
    SyncFn,
    /// Not inside any function body we could find
    None,
}

/// One scanned source file
#[derive(Debug)]
pub struct SourceFile {
    /// File path
    pub path: PathBuf,
    /// Raw lines
    pub lines: Vec<String>,
    /// First line of a `#[cfg(test)]` block, if any
    test_start: Option<usize>,
}

impl SourceFile {
    /// Scan file content
    #[must_use]
    pub fn new(path: PathBuf, content: &str) -> Self {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let test_start = lines.iter().position(|l| l.trim() == "#[cfg(test)]");
        Self {
            path,
            lines,
            test_start,
        }
    }

    /// Line with any trailing `//` comment removed; doc and comment lines are empty
    #[must_use]
    pub fn code(&self, idx: usize) -> &str {
        let line = self.lines[idx].as_str();
        if line.trim_start().starts_with("//") {
            return "";
        }
        line.split("//").next().unwrap_or(line)
    }

    /// Whether the line belongs to test code
    #[must_use]
    pub fn is_test_code(&self, idx: usize) -> bool {
        if self.test_start.is_some_and(|start| idx >= start) {
            return true;
        }

        // A #[test] function outside a test module
        for i in (0..idx).rev() {
            if fn_signature(self.code(i)).is_some() {
                return (0..i)
                    .rev()
                    .map(|j| self.lines[j].trim())
                    .take_while(|l| l.starts_with("#[") || l.starts_with("///"))
                    .any(is_test_attribute);
            }
        }
        false
    }

    /// Nearest enclosing function kind, scanning upward
    #[must_use]
    pub fn enclosing_fn(&self, idx: usize) -> Enclosing {
        for i in (0..=idx).rev() {
            let code = self.code(i);
            if let Some(is_async) = fn_signature(code) {
                return if is_async {
                    Enclosing::AsyncFn
                } else {
                    Enclosing::SyncFn
                };
            }
            let trimmed = code.trim();
            if trimmed.starts_with("mod ") || (trimmed.starts_with("impl") && trimmed.ends_with('{')) {
                return Enclosing::None;
            }
        }
        Enclosing::None
    }

    /// Report a violation at a line
    #[must_use]
    pub fn violation(&self, idx: usize, what: &str) -> String {
        format!(
            "{}:{} - {what}: {}",
            self.path.display(),
            idx + 1,
            self.lines[idx].trim()
        )
    }
}

fn is_test_attribute(line: &str) -> bool {
    line.starts_with("#[test]") || line.starts_with("#[tokio::test")
}

/// If the line starts a function, whether that function is async
#[must_use]
pub fn fn_signature(code: &str) -> Option<bool> {
    let mut rest = code.trim_start();

    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }

    let mut is_async = false;
    loop {
        if let Some(stripped) = rest.strip_prefix("async ") {
            is_async = true;
            rest = stripped;
        } else if let Some(stripped) = rest
            .strip_prefix("const ")
            .or_else(|| rest.strip_prefix("unsafe "))
        {
            rest = stripped;
        } else {
            break;
        }
    }

    rest.starts_with("fn ").then_some(is_async)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(lines: &[&str]) -> SourceFile {
        SourceFile::new(PathBuf::from("x.rs"), &lines.join("\n"))
    }

    #[test]
    fn test_fn_signatures() {
        assert_eq!(fn_signature("fn main() {"), Some(false));
        assert_eq!(fn_signature("    pub fn load(&self) -> Result<()> {"), Some(false));
        assert_eq!(fn_signature("pub(crate) async fn send(&mut self) {"), Some(true));
        assert_eq!(fn_signature("    async fn next_step(&mut self) -> bool {"), Some(true));
        assert_eq!(fn_signature("let f = fn_name();"), None);
        assert_eq!(fn_signature("impl Foo {"), None);
    }

    #[test]
    fn test_enclosing_fn() {
        let src = file(&[
            "impl Store {",
            "    pub fn load(&self) {",
            "        std::fs::read_to_string(p);",
            "    }",
            "    pub async fn save(&self) {",
            "        std::fs::write(p, b);",
            "    }",
            "}",
        ]);

        assert_eq!(src.enclosing_fn(2), Enclosing::SyncFn);
        assert_eq!(src.enclosing_fn(5), Enclosing::AsyncFn);
        assert_eq!(src.enclosing_fn(0), Enclosing::None);
    }

    #[test]
    fn test_doc_comments_are_not_code() {
        let src = file(&["//! async fn main() {", "/// fn docs() {", "let x = 1; // fn y"]);

        assert_eq!(src.code(0), "");
        assert_eq!(src.code(1), "");
        assert_eq!(src.code(2).trim(), "let x = 1;");
        assert_eq!(src.enclosing_fn(2), Enclosing::None);
    }

    #[test]
    fn test_test_code_detection() {
        let src = file(&[
            "#[tokio::test]",
            "async fn test_a() {",
            "    std::fs::write(p, b);",
            "}",
            "async fn real() {",
            "    work();",
            "}",
            "#[cfg(test)]",
            "mod tests {",
            "    async fn helper() { std::fs::write(p, b); }",
            "}",
        ]);

        assert!(src.is_test_code(2));
        assert!(!src.is_test_code(5));
        assert!(src.is_test_code(9));
    }

    #[test]
    fn test_production_dirs_exist() {
        for dir in PRODUCTION_DIRS {
            assert!(workspace_root().join(dir).is_dir(), "{dir} missing");
        }
    }
}
