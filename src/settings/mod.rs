//! Team settings resolution.
//!
//! Each team stores three free-form JSON documents (`analysis_config`,
//! `workflow_config`, `metrics_config`). The resolver recursively merges the
//! stored overrides over the built-in defaults and exposes the result as
//! typed structs, so the rest of the codebase never reaches into raw JSON.
//! Callers must not assume a key exists without going through the resolver.

use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One ordered keyword rule of the commit classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationRule {
    pub name: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub priority: i64,
}

/// Classifier rule table plus its fallback category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CommitClassification {
    pub default_category: String,
    pub rules: Vec<ClassificationRule>,
}

impl Default for CommitClassification {
    fn default() -> Self {
        let rule = |name: &str, category: &str, keywords: &[&str], priority: i64| {
            ClassificationRule {
                name: name.to_string(),
                category: category.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                priority,
            }
        };

        Self {
            default_category: "other".to_string(),
            rules: vec![
                rule("Feature", "feat", &["feat", "add", "new", "implement", "introduce"], 95),
                rule("Bugfix", "fix", &["fix", "bug", "patch", "resolve", "repair"], 99),
                rule("Performance", "perf", &["perf", "performance", "optimize", "speed"], 85),
                rule(
                    "Refactor",
                    "refactor",
                    &["refactor", "restructure", "rework", "reorganize", "simplify"],
                    80,
                ),
                rule("Tests", "test", &["test", "spec", "coverage"], 75),
                rule("Docs", "docs", &["docs", "doc", "readme", "changelog", "document"], 70),
                rule("Chore", "chore", &["chore", "build", "ci", "cd", "deps", "upgrade", "bump"], 60),
                rule("Style", "style", &["style", "format", "lint", "prettier", "whitespace"], 55),
                rule("Revert", "revert", &["revert", "rollback"], 90),
            ],
        }
    }
}

/// File-path exclusion settings feeding the ignore filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FileFilters {
    pub exclude_patterns: Vec<String>,
    pub exclude_hidden: bool,
}

impl Default for FileFilters {
    fn default() -> Self {
        Self {
            exclude_patterns: [
                "*.lock",
                "package-lock.json",
                "yarn.lock",
                "pnpm-lock.yaml",
                "*.min.js",
                "*.min.css",
                "dist/",
                "build/",
                "node_modules/",
                "__pycache__/",
                "*.pyc",
                "*.egg-info/",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            exclude_hidden: true,
        }
    }
}

/// Handling of merge/revert/bot commits in analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpecialCommits {
    pub include_merge_commits: bool,
    pub include_revert_commits: bool,
    pub bot_logins: Vec<String>,
}

impl Default for SpecialCommits {
    fn default() -> Self {
        Self {
            include_merge_commits: false,
            include_revert_commits: true,
            bot_logins: vec![
                "dependabot[bot]".to_string(),
                "renovate[bot]".to_string(),
                "github-actions[bot]".to_string(),
            ],
        }
    }
}

/// The `analysis_config` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    pub file_filters: FileFilters,
    pub commit_classification: CommitClassification,
    pub special_commits: SpecialCommits,
    pub breaking_change_markers: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            file_filters: FileFilters::default(),
            commit_classification: CommitClassification::default(),
            special_commits: SpecialCommits::default(),
            breaking_change_markers: vec![
                "!".to_string(),
                "BREAKING CHANGE".to_string(),
                "BREAKING-CHANGE".to_string(),
            ],
        }
    }
}

/// Sprint cadence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SprintConfig {
    pub enabled: bool,
    pub duration_days: i64,
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_days: 14,
        }
    }
}

/// Working-hours window used by reporting surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WorkingHours {
    pub start: u8,
    pub end: u8,
    pub timezone: String,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: 9,
            end: 18,
            timezone: "UTC".to_string(),
        }
    }
}

/// The `workflow_config` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WorkflowConfig {
    pub sprint: SprintConfig,
    pub working_hours: WorkingHours,
    pub working_days: Vec<u8>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            sprint: SprintConfig::default(),
            working_hours: WorkingHours::default(),
            working_days: vec![1, 2, 3, 4, 5],
        }
    }
}

/// The `metrics_config` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetricsConfig {
    pub commit_weights: BTreeMap<String, f64>,
    pub significant_commit_min_lines: i64,
    pub require_conventional_commits: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let commit_weights = [
            ("feat", 3.0),
            ("fix", 2.0),
            ("refactor", 2.0),
            ("test", 1.5),
            ("perf", 2.5),
            ("docs", 0.5),
            ("style", 0.5),
            ("chore", 0.5),
            ("ci", 0.5),
            ("build", 0.5),
            ("revert", 0.0),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

        Self {
            commit_weights,
            significant_commit_min_lines: 5,
            require_conventional_commits: false,
        }
    }
}

/// Weight applied to a commit type when scoring; unknown types weigh 0.5.
pub fn commit_weight(metrics: &MetricsConfig, commit_type: &str) -> f64 {
    metrics.commit_weights.get(commit_type).copied().unwrap_or(0.5)
}

/// Fully resolved team settings: overrides merged over defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TeamSettings {
    pub analysis: AnalysisConfig,
    pub workflow: WorkflowConfig,
    pub metrics: MetricsConfig,
}

impl TeamSettings {
    /// Resolve the three stored documents. Malformed stored JSON is treated
    /// as an empty override and logged.
    pub fn resolve(
        analysis_config: Option<&str>,
        workflow_config: Option<&str>,
        metrics_config: Option<&str>,
    ) -> Self {
        Self {
            analysis: resolve_document(analysis_config),
            workflow: resolve_document(workflow_config),
            metrics: resolve_document(metrics_config),
        }
    }
}

/// Merge one stored document over its defaults and return the merged JSON.
pub fn resolve_document_value<T: Default + Serialize>(stored: Option<&str>) -> JsonValue {
    let mut base = serde_json::to_value(T::default()).unwrap_or(JsonValue::Null);

    if let Some(raw) = stored {
        match serde_json::from_str::<JsonValue>(raw) {
            Ok(overrides) => deep_merge(&mut base, &overrides),
            Err(err) => log::warn!("ignoring malformed settings document: {}", err),
        }
    }

    base
}

/// Merge one stored document over its defaults and return the typed view.
pub fn resolve_document<T: Default + Serialize + DeserializeOwned>(stored: Option<&str>) -> T {
    let merged = resolve_document_value::<T>(stored);
    serde_json::from_value(merged).unwrap_or_else(|err| {
        log::warn!("settings document failed typed validation: {}", err);
        T::default()
    })
}

/// Recursive merge: when both sides hold an object, recurse per key;
/// otherwise the override wins. `base` is mutated in place, the override is
/// never touched.
pub fn deep_merge(base: &mut JsonValue, overrides: &JsonValue) {
    match (base, overrides) {
        (JsonValue::Object(base_map), JsonValue::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, _) => {
            *base_slot = overrides.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_override_returns_defaults() {
        let merged = resolve_document::<MetricsConfig>(Some("{}"));
        assert_eq!(merged, MetricsConfig::default());

        let merged = resolve_document::<MetricsConfig>(None);
        assert_eq!(merged, MetricsConfig::default());
    }

    #[test]
    fn merge_is_idempotent() {
        let override_doc = r#"{"significant_commit_min_lines": 10}"#;
        let once = resolve_document_value::<MetricsConfig>(Some(override_doc));

        let once_str = once.to_string();
        let twice = resolve_document_value::<MetricsConfig>(Some(&once_str));

        assert_eq!(once, twice);
    }

    #[test]
    fn scalar_override_wins_and_siblings_survive() {
        let workflow = resolve_document::<WorkflowConfig>(Some(
            r#"{"sprint": {"duration_days": 7}}"#,
        ));
        assert_eq!(workflow.sprint.duration_days, 7);
        // Sibling key inside the same map keeps its default.
        assert!(!workflow.sprint.enabled);
        assert_eq!(workflow.working_hours.start, 9);
    }

    #[test]
    fn non_map_override_replaces_wholesale() {
        let mut base = json!({"working_days": [1, 2, 3, 4, 5]});
        deep_merge(&mut base, &json!({"working_days": [6, 7]}));
        assert_eq!(base["working_days"], json!([6, 7]));
    }

    #[test]
    fn malformed_document_falls_back_to_defaults() {
        let merged = resolve_document::<AnalysisConfig>(Some("{not json"));
        assert_eq!(merged, AnalysisConfig::default());
    }

    #[test]
    fn default_rule_table_matches_builtin_priorities() {
        let classification = CommitClassification::default();
        let bugfix = classification
            .rules
            .iter()
            .find(|r| r.name == "Bugfix")
            .unwrap();
        assert_eq!(bugfix.priority, 99);
        assert_eq!(bugfix.category, "fix");
        assert_eq!(classification.default_category, "other");
    }

    #[test]
    fn unknown_commit_type_weighs_half() {
        let metrics = MetricsConfig::default();
        assert_eq!(commit_weight(&metrics, "feat"), 3.0);
        assert_eq!(commit_weight(&metrics, "mystery"), 0.5);
    }
}
