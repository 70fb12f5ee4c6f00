//! Heuristic commit classification.
//!
//! A deterministic, priority-ranked keyword pass over the commit message plus
//! structural flags derived from the parents and files lists. For identical
//! input the output is identical; no I/O, no state.

use crate::settings::AnalysisConfig;
use regex::Regex;
use std::sync::OnceLock;

/// Derived classification block persisted alongside each commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEnrichment {
    pub commit_type: String,
    pub is_conventional: bool,
    pub conventional_type: String,
    pub conventional_scope: String,
    pub is_breaking_change: bool,
    pub parents_count: i32,
    pub is_merge_commit: bool,
    pub is_pr_commit: bool,
    pub files_changed: Option<i32>,
    pub is_revert_commit: bool,
}

/// Classify one commit from its message, parent count and (filtered) file
/// count under the team's analysis settings.
///
/// Rule matching runs over the lowercased first message line; the rule with
/// the highest priority wins and ties go to the rule listed first. The
/// remaining flags are derived from the full lowercased message.
pub fn classify_commit(
    message: &str,
    parents_count: usize,
    files_count: Option<usize>,
    settings: &AnalysisConfig,
) -> CommitEnrichment {
    let msg = message.to_lowercase();
    let first_line = msg.lines().next().unwrap_or("");

    let classification = &settings.commit_classification;
    let default_category = classification.default_category.as_str();

    let mut matched_category = default_category;
    let mut highest_priority = i64::MIN;
    for rule in &classification.rules {
        let rule_matches = rule
            .keywords
            .iter()
            .any(|keyword| first_line.contains(&keyword.to_lowercase()));
        if rule_matches && rule.priority > highest_priority {
            matched_category = rule.category.as_str();
            highest_priority = rule.priority;
        }
    }

    let commit_type = matched_category.to_string();
    let is_conventional = commit_type != default_category;
    let conventional_type = if is_conventional {
        commit_type.clone()
    } else {
        "unknown".to_string()
    };

    let conventional_scope = match scope_regex().find(&msg) {
        Some(found) => found
            .as_str()
            .split(':')
            .next()
            .unwrap_or("no")
            .to_string(),
        None => "no".to_string(),
    };

    // Single-character markers such as "!" are covered by the prefix checks;
    // matching them anywhere would flag every exclamation mark.
    let is_breaking_change = msg.starts_with('!')
        || msg.starts_with("breaking")
        || settings
            .breaking_change_markers
            .iter()
            .any(|marker| marker.chars().count() > 1 && msg.contains(&marker.to_lowercase()));

    let parents = parents_count as i32;
    let is_merge_commit = parents > 1;

    let is_pr_commit = msg.contains("merge pull request")
        || msg.contains("merge mr")
        || pr_number_regex().is_match(&msg)
        || msg.contains("pull request");

    let files_changed = match files_count {
        Some(0) | None => None,
        Some(n) => Some(n as i32),
    };

    let is_revert_commit = msg.starts_with("revert")
        || msg.starts_with("rollback")
        || msg.contains("this reverts commit");

    CommitEnrichment {
        commit_type,
        is_conventional,
        conventional_type,
        conventional_scope,
        is_breaking_change,
        parents_count: parents,
        is_merge_commit,
        is_pr_commit,
        files_changed,
        is_revert_commit,
    }
}

fn scope_regex() -> &'static Regex {
    static SCOPE: OnceLock<Regex> = OnceLock::new();
    SCOPE.get_or_init(|| Regex::new(r"^\w+:\s").unwrap())
}

fn pr_number_regex() -> &'static Regex {
    static PR_NUMBER: OnceLock<Regex> = OnceLock::new();
    PR_NUMBER.get_or_init(|| Regex::new(r"#\d+").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AnalysisConfig, ClassificationRule};

    fn two_rule_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.commit_classification.default_category = "other".to_string();
        config.commit_classification.rules = vec![
            ClassificationRule {
                name: "Bugfix".to_string(),
                category: "fix".to_string(),
                keywords: vec!["fix".to_string()],
                priority: 99,
            },
            ClassificationRule {
                name: "Feature".to_string(),
                category: "feat".to_string(),
                keywords: vec!["add".to_string()],
                priority: 95,
            },
        ];
        config
    }

    #[test]
    fn highest_priority_rule_wins() {
        let config = two_rule_config();
        let enrichment = classify_commit("fix: add missing null check", 1, Some(2), &config);

        assert_eq!(enrichment.commit_type, "fix");
        assert_eq!(enrichment.conventional_type, "fix");
        assert_eq!(enrichment.conventional_scope, "fix");
        assert!(enrichment.is_conventional);
        assert!(!enrichment.is_breaking_change);
    }

    #[test]
    fn ties_break_to_first_listed_rule() {
        let mut config = two_rule_config();
        config.commit_classification.rules[0].priority = 95;
        let enrichment = classify_commit("fix: add missing null check", 1, None, &config);
        assert_eq!(enrichment.commit_type, "fix");
    }

    #[test]
    fn unmatched_message_falls_back_to_default_category() {
        let config = two_rule_config();
        let enrichment = classify_commit("wip", 1, None, &config);

        assert_eq!(enrichment.commit_type, "other");
        assert!(!enrichment.is_conventional);
        assert_eq!(enrichment.conventional_type, "unknown");
        assert_eq!(enrichment.conventional_scope, "no");
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let config = two_rule_config();
        let a = classify_commit("fix(api): resolve timeout #42", 2, Some(3), &config);
        let b = classify_commit("fix(api): resolve timeout #42", 2, Some(3), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn merge_flag_requires_two_parents() {
        let config = two_rule_config();
        assert!(!classify_commit("fix things", 1, None, &config).is_merge_commit);
        assert!(classify_commit("fix things", 2, None, &config).is_merge_commit);
        assert_eq!(classify_commit("fix things", 2, None, &config).parents_count, 2);
    }

    #[test]
    fn pr_detection_covers_all_forms() {
        let config = two_rule_config();
        assert!(classify_commit("Merge pull request #12 from x/y", 2, None, &config).is_pr_commit);
        assert!(classify_commit("merge mr 42", 1, None, &config).is_pr_commit);
        assert!(classify_commit("add retries (#123)", 1, None, &config).is_pr_commit);
        assert!(!classify_commit("plain change", 1, None, &config).is_pr_commit);
    }

    #[test]
    fn revert_detection() {
        let config = two_rule_config();
        assert!(classify_commit("Revert \"add feature\"", 1, None, &config).is_revert_commit);
        assert!(classify_commit("rollback deploy", 1, None, &config).is_revert_commit);
        assert!(
            classify_commit("cleanup\n\nThis reverts commit abc123.", 1, None, &config)
                .is_revert_commit
        );
    }

    #[test]
    fn breaking_markers_from_settings_apply() {
        let mut config = two_rule_config();
        config.breaking_change_markers = vec!["BREAKING CHANGE".to_string()];
        let enrichment = classify_commit(
            "feat: new api\n\nBREAKING CHANGE: removes v1 endpoints",
            1,
            None,
            &config,
        );
        assert!(enrichment.is_breaking_change);

        let plain = classify_commit("feat: new api", 1, None, &config);
        assert!(!plain.is_breaking_change);
    }

    #[test]
    fn bare_exclamation_marker_only_matches_at_message_start() {
        let mut config = two_rule_config();
        config.breaking_change_markers =
            vec!["!".to_string(), "BREAKING CHANGE".to_string()];

        assert!(classify_commit("!drop legacy api", 1, None, &config).is_breaking_change);
        assert!(!classify_commit("fix: finally works!", 1, None, &config).is_breaking_change);
    }

    #[test]
    fn empty_files_list_leaves_files_changed_unset() {
        let config = two_rule_config();
        assert_eq!(classify_commit("fix x", 1, Some(0), &config).files_changed, None);
        assert_eq!(classify_commit("fix x", 1, Some(4), &config).files_changed, Some(4));
    }
}
