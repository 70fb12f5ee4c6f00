//! Wire-format payloads returned by the GitHub REST API, trimmed to the
//! fields the ingest pipeline actually consumes.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Forge account reference as embedded in commits, PRs and issues.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRef {
    pub login: String,
    pub id: i64,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// Commit signature (name/email/date) for author or committer.
#[derive(Debug, Clone, Deserialize)]
pub struct GitSignature {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Raw RFC 3339 timestamp; kept as text because entries with a missing
    /// or unparsable date are partitioned into the archive rather than
    /// rejected.
    pub date: Option<String>,
}

impl GitSignature {
    /// Parse the signature date, if present and well-formed.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        parse_forge_timestamp(self.date.as_deref()?)
    }
}

/// Nested `commit` object shared by the list and detail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSignature {
    pub author: Option<GitSignature>,
    pub committer: Option<GitSignature>,
    pub message: String,
}

/// Entry from `GET /repos/{o}/{r}/commits` (abbreviated form).
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub commit: CommitSignature,
    pub author: Option<AccountRef>,
}

impl CommitSummary {
    /// Author date used for sprint/archive partitioning.
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit.author.as_ref().and_then(GitSignature::parsed_date)
    }
}

/// Aggregate line counts on a full commit.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitStats {
    pub additions: Option<i32>,
    pub deletions: Option<i32>,
    pub total: Option<i32>,
}

/// Per-file change on a full commit.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub additions: Option<i32>,
    pub deletions: Option<i32>,
    pub changes: Option<i32>,
    pub patch: Option<String>,
}

/// Parent reference on a full commit.
#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub sha: String,
}

/// Full commit from `GET /repos/{o}/{r}/commits/{sha}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    pub commit: CommitSignature,
    pub author: Option<AccountRef>,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    pub stats: Option<CommitStats>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// Entry from `GET /repos/{o}/{r}/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorEntry {
    pub login: String,
    pub id: i64,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// Entry from `GET /repos/{o}/{r}/pulls?state=all`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullEntry {
    pub id: i64,
    pub number: i32,
    pub title: Option<String>,
    pub state: Option<String>,
    pub user: Option<AccountRef>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Entry from `GET /repos/{o}/{r}/issues?state=all`. The issues feed also
/// carries pull requests; those rows have `pull_request` set and are dropped
/// by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueEntry {
    pub id: i64,
    pub number: i32,
    pub title: Option<String>,
    pub state: Option<String>,
    pub user: Option<AccountRef>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pull_request: Option<JsonValue>,
}

/// Parse a forge timestamp, accepting both `Z` and offset forms.
pub fn parse_forge_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zulu_timestamps() {
        let parsed = parse_forge_timestamp("2026-03-01T00:00:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    }

    #[test]
    fn parses_offset_timestamps() {
        let parsed = parse_forge_timestamp("2026-03-01T03:00:00+03:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_forge_timestamp("not-a-date").is_none());
        assert!(parse_forge_timestamp("").is_none());
    }

    #[test]
    fn commit_summary_partition_date_comes_from_author() {
        let summary: CommitSummary = serde_json::from_value(serde_json::json!({
            "sha": "a1b2c3",
            "commit": {
                "author": {"name": "Dev", "email": "dev@example.com", "date": "2026-02-15T00:00:01Z"},
                "committer": {"name": "Dev", "email": "dev@example.com", "date": "2026-02-15T00:00:05Z"},
                "message": "feat: add widget"
            },
            "author": {"login": "dev", "id": 1, "avatar_url": null, "html_url": null}
        }))
        .unwrap();

        assert_eq!(
            summary.authored_at().unwrap().to_rfc3339(),
            "2026-02-15T00:00:01+00:00"
        );
    }
}
