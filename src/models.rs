//! Data transfer objects exposed by the API.
//!
//! Every struct in this module derives `JsonSchema` so `rocket_okapi` can
//! describe the payloads accurately in the generated OpenAPI document.

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Hosted source-control platform a repository or contributor belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "vcs_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VcsProvider {
    Github,
    Gitlab,
    Bitbucket,
    Svn,
}

impl VcsProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsProvider::Github => "github",
            VcsProvider::Gitlab => "gitlab",
            VcsProvider::Bitbucket => "bitbucket",
            VcsProvider::Svn => "svn",
        }
    }
}

/// External project mirrored into the local store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Repository {
    /// Database identifier.
    pub id: i32,
    /// Forge that hosts the repository.
    pub vcs_provider: VcsProvider,
    /// Provider-assigned identifier, when known.
    pub external_id: Option<String>,
    /// Owner slug (user or organization).
    pub owner: String,
    /// Repository slug.
    pub name: String,
    /// Canonical URL.
    pub url: String,
    /// Default branch, when known.
    pub default_branch: Option<String>,
    /// Optional project back-reference (collaborator-owned).
    pub project_id: Option<i32>,
    /// Owning team, when linked.
    pub team_id: Option<i32>,
    /// When the row was created.
    pub created_at: Option<DateTime<Utc>>,
}

/// A person on the remote forge, unique per `(provider, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Contributor {
    /// Database identifier.
    pub id: i32,
    /// Forge the account lives on.
    pub vcs_provider: VcsProvider,
    /// Provider-assigned account identifier.
    pub external_id: String,
    /// Login handle.
    pub login: Option<String>,
    /// Display name, when exposed by the forge.
    pub display_name: Option<String>,
    /// Email address, when exposed.
    pub email: Option<String>,
    /// Profile / avatar URL.
    pub profile_url: Option<String>,
    /// When the row was created.
    pub created_at: Option<DateTime<Utc>>,
}

/// A single VCS commit with its enrichment block.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Commit {
    /// Database identifier.
    pub id: i32,
    /// Parent repository.
    pub repository_id: i32,
    /// Attributed contributor, when the forge resolved one.
    pub contributor_id: Option<i32>,
    /// Commit SHA, unique within the repository and immutable once written.
    pub sha: String,
    /// Full commit message.
    pub message: String,
    /// Author timestamp.
    pub authored_at: Option<DateTime<Utc>>,
    /// Committer timestamp.
    pub committed_at: Option<DateTime<Utc>>,
    /// Raw author name from the commit signature.
    pub author_name: Option<String>,
    /// Raw author email from the commit signature.
    pub author_email: Option<String>,
    /// Lines added.
    pub additions: Option<i32>,
    /// Lines deleted.
    pub deletions: Option<i32>,
    /// Total changed lines.
    pub changes: Option<i32>,
    /// Classifier category (e.g. `feat`, `fix`).
    pub commit_type: Option<String>,
    /// Whether a classification rule matched.
    pub is_conventional: Option<bool>,
    /// Conventional-commit type derived from the category.
    pub conventional_type: Option<String>,
    /// Scope token before the first colon, or `no`.
    pub conventional_scope: Option<String>,
    /// Breaking-change marker detected in the message.
    pub is_breaking_change: Option<bool>,
    /// More than one parent.
    pub is_merge_commit: Option<bool>,
    /// Message references a pull request.
    pub is_pr_commit: Option<bool>,
    /// Message reverts an earlier commit.
    pub is_revert_commit: Option<bool>,
    /// Number of parent commits.
    pub parents_count: Option<i32>,
    /// Number of files changed (after ignore filtering).
    pub files_changed: Option<i32>,
    /// When the row was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the row was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-commit file change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct CommitFile {
    /// Database identifier.
    pub id: i32,
    /// Parent commit.
    pub commit_id: i32,
    /// Path within the repository.
    pub file_path: String,
    /// Lines added in this file.
    pub additions: Option<i32>,
    /// Lines deleted in this file.
    pub deletions: Option<i32>,
    /// Total changed lines in this file.
    pub changes: Option<i32>,
    /// Detected language, or `unknown`.
    pub language: Option<String>,
    /// Unified diff patch, when the forge provided one.
    pub patch: Option<String>,
}

/// Pull request mirrored from the forge, unique per `(repository, number)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct PullRequest {
    pub id: i32,
    pub repository_id: i32,
    pub contributor_id: Option<i32>,
    /// Provider-assigned identifier.
    pub external_id: Option<i64>,
    /// Forge-local PR number.
    pub number: i32,
    pub title: String,
    /// `open`, `closed` or `merged`.
    pub state: String,
    pub author_login: Option<String>,
    pub author_avatar: Option<String>,
    pub pr_created_at: Option<DateTime<Utc>>,
    pub pr_closed_at: Option<DateTime<Utc>>,
    pub pr_merged_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Issue mirrored from the forge, unique per `(repository, number)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Issue {
    pub id: i32,
    pub repository_id: i32,
    pub contributor_id: Option<i32>,
    /// Provider-assigned identifier.
    pub external_id: Option<i64>,
    /// Forge-local issue number.
    pub number: i32,
    pub title: String,
    /// `open` or `closed`.
    pub state: String,
    pub author_login: Option<String>,
    pub author_avatar: Option<String>,
    pub issue_created_at: Option<DateTime<Utc>>,
    pub issue_closed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Pagination metadata accompanying list responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaginationMeta {
    /// One-based page index.
    pub page: i64,
    /// Page size.
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    /// Total number of matching records.
    #[serde(rename = "totalElements")]
    pub total_elements: i64,
    /// Total number of pages.
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PaginationMeta {
    /// Compute pagination totals for a page of results.
    pub fn new(page: i64, page_size: i64, total_elements: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_elements + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            page,
            page_size,
            total_elements,
            total_pages,
        }
    }
}

/// Optional envelope metadata attached to API responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResponseMeta {
    /// Team the payload was scoped to, when applicable.
    #[serde(rename = "teamId", skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i32>,
    /// Pagination details for list payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    /// Echo of any filters applied server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<JsonMap<String, JsonValue>>,
}

impl ResponseMeta {
    pub fn with_team_id(mut self, team_id: i32) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationMeta) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_filters(mut self, filters: JsonMap<String, JsonValue>) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Uniform envelope wrapping every JSON payload served by the API.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    /// Response payload.
    pub data: T,
    /// Envelope metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    pub fn with_meta(data: T, meta: ResponseMeta) -> Self {
        Self {
            data,
            meta: Some(meta),
        }
    }
}
