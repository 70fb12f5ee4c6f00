//! Map filenames to languages via the extension table.
//!
//! The table is built-in seed data merged with rows from the mutable
//! `file_extensions` table, loaded once per sync so the per-file lookup in
//! the hot path stays read-only.

use rocket_db_pools::sqlx::PgPool;
use std::collections::HashMap;

const UNKNOWN: &str = "unknown";

const BUILTIN_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("py", "Python"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("go", "Go"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("hpp", "C++"),
    ("cs", "C#"),
    ("swift", "Swift"),
    ("m", "Objective-C"),
    ("scala", "Scala"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("less", "Less"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("yml", "YAML"),
    ("toml", "TOML"),
    ("xml", "XML"),
    ("md", "Markdown"),
    ("rst", "reStructuredText"),
    ("tex", "TeX"),
    ("r", "R"),
    ("pl", "Perl"),
    ("lua", "Lua"),
    ("dart", "Dart"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("erl", "Erlang"),
    ("hs", "Haskell"),
    ("clj", "Clojure"),
    ("zig", "Zig"),
    ("proto", "Protocol Buffers"),
    ("tf", "Terraform"),
    ("gradle", "Gradle"),
];

/// Extensionless filenames we can still attribute.
const SPECIAL_FILENAMES: &[(&str, &str)] = &[
    ("makefile", "Makefile"),
    ("dockerfile", "Dockerfile"),
    ("rakefile", "Ruby"),
    ("gemfile", "Ruby"),
    ("cmakelists.txt", "CMake"),
];

/// Extension-to-language lookup.
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    extensions: HashMap<String, String>,
}

impl LanguageDetector {
    /// Detector backed by the built-in seed table only.
    pub fn with_builtin() -> Self {
        let extensions = BUILTIN_EXTENSIONS
            .iter()
            .map(|(ext, lang)| (ext.to_string(), lang.to_string()))
            .collect();

        Self { extensions }
    }

    /// Builtin seed merged with the `file_extensions` table; database rows
    /// win so operators can override the defaults.
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let mut detector = Self::with_builtin();

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT extension, language FROM file_extensions")
                .fetch_all(pool)
                .await?;

        for (extension, language) in rows {
            detector.extensions.insert(extension.to_lowercase(), language);
        }

        Ok(detector)
    }

    /// Language for a repository path, `unknown` when nothing matches.
    pub fn detect(&self, filename: &str) -> &str {
        let basename = filename.rsplit('/').next().unwrap_or(filename);

        if let Some((_, dot_suffix)) = basename.rsplit_once('.') {
            if let Some(language) = self.extensions.get(&dot_suffix.to_lowercase()) {
                return language;
            }
        }

        let lowered = basename.to_lowercase();
        for (name, language) in SPECIAL_FILENAMES {
            if lowered == *name {
                return language;
            }
        }

        UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        let d = LanguageDetector::with_builtin();
        assert_eq!(d.detect("src/main.rs"), "Rust");
        assert_eq!(d.detect("app/models/user.py"), "Python");
        assert_eq!(d.detect("web/index.TSX"), "TypeScript");
    }

    #[test]
    fn uses_last_extension_token() {
        let d = LanguageDetector::with_builtin();
        assert_eq!(d.detect("bundle.min.js"), "JavaScript");
        assert_eq!(d.detect("archive.tar.gz"), "unknown");
    }

    #[test]
    fn recognizes_special_filenames() {
        let d = LanguageDetector::with_builtin();
        assert_eq!(d.detect("Makefile"), "Makefile");
        assert_eq!(d.detect("docker/Dockerfile"), "Dockerfile");
        assert_eq!(d.detect("CMakeLists.txt"), "CMake");
    }

    #[test]
    fn unknown_for_unmapped_paths() {
        let d = LanguageDetector::with_builtin();
        assert_eq!(d.detect("LICENSE"), "unknown");
        assert_eq!(d.detect("data.bin"), "unknown");
    }
}
