//! Drop uninteresting file paths (lockfiles, vendored directories, dotfiles)
//! before language detection and persistence.

use std::io;
use std::path::Path;

/// Team-scoped ignore list applied to every commit's file set.
///
/// A path is rejected when it starts with `.` or matches any configured
/// pattern. Patterns use suffix semantics: `*.lock` and `.lock` both match
/// `Cargo.lock`; a trailing-slash pattern such as `node_modules/` rejects
/// anything under that directory.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<String>,
}

impl IgnoreFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Load a newline-delimited pattern list; blank lines and `#` comments
    /// are skipped.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        Ok(Self {
            patterns: Self::load_patterns(path)?,
        })
    }

    /// Read patterns from a newline-delimited file without building a
    /// filter, so callers can merge them with team-scoped patterns.
    pub fn load_patterns(path: &Path) -> io::Result<Vec<String>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    /// Whether the path survives filtering.
    pub fn is_allowed(&self, path: &str) -> bool {
        if path.starts_with('.') {
            return false;
        }

        !self.patterns.iter().any(|pattern| matches(path, pattern))
    }
}

fn matches(path: &str, pattern: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix('/') {
        let needle = format!("{dir}/");
        return path.starts_with(&needle) || path.contains(&format!("/{needle}"));
    }

    let suffix = pattern.strip_prefix('*').unwrap_or(pattern);
    path.ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> IgnoreFilter {
        IgnoreFilter::new(vec![
            "*.lock".to_string(),
            "package-lock.json".to_string(),
            "*.min.js".to_string(),
            "node_modules/".to_string(),
            "dist/".to_string(),
        ])
    }

    #[test]
    fn rejects_dotfiles() {
        let f = filter();
        assert!(!f.is_allowed(".gitignore"));
        assert!(!f.is_allowed(".github/workflows/ci.yml"));
    }

    #[test]
    fn rejects_suffix_matches() {
        let f = filter();
        assert!(!f.is_allowed("Cargo.lock"));
        assert!(!f.is_allowed("frontend/package-lock.json"));
        assert!(!f.is_allowed("assets/vendor.min.js"));
    }

    #[test]
    fn rejects_directory_patterns_at_any_depth() {
        let f = filter();
        assert!(!f.is_allowed("node_modules/left-pad/index.js"));
        assert!(!f.is_allowed("packages/app/node_modules/x.js"));
        assert!(!f.is_allowed("dist/bundle.js"));
    }

    #[test]
    fn allows_regular_sources() {
        let f = filter();
        assert!(f.is_allowed("src/main.rs"));
        assert!(f.is_allowed("docs/README.md"));
        assert!(f.is_allowed("distance.py"));
    }

    #[test]
    fn empty_filter_only_drops_dotfiles() {
        let f = IgnoreFilter::default();
        assert!(f.is_allowed("Cargo.lock"));
        assert!(!f.is_allowed(".env"));
    }

    #[test]
    fn pattern_file_skips_comments_and_blanks() {
        let path = std::env::temp_dir().join("forgepulse-ignore-test.txt");
        std::fs::write(&path, "# generated artifacts\n*.lock\n\ndist/\n").unwrap();

        let patterns = IgnoreFilter::load_patterns(&path).unwrap();
        assert_eq!(patterns, vec!["*.lock".to_string(), "dist/".to_string()]);

        let filter = IgnoreFilter::from_file(&path).unwrap();
        assert!(!filter.is_allowed("Cargo.lock"));
        assert!(filter.is_allowed("src/main.rs"));

        let _ = std::fs::remove_file(&path);
    }
}
