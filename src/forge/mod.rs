//! Forge access layer: the provider capability trait, the GitHub wire
//! implementation, and the shared rate limiter that gates every outbound
//! call.
//!
//! The service carries a `vcs_provider` tag on mirrored data even though only
//! the GitHub client is implemented today; the trait keeps the seam explicit
//! so GitLab/Bitbucket variants can slot in without touching the sync
//! pipeline.

pub mod github;
pub mod rate_limit;
pub mod types;

use chrono::{DateTime, Utc};

pub use github::{ForgeError, GithubClient};
pub use rate_limit::{RateLimiter, RateLimiterStatus};
pub use types::{CommitDetail, CommitSummary, ContributorEntry, IssueEntry, PullEntry};

/// Capability surface required from a forge provider.
///
/// Every method maps to a single logical endpoint of the provider's REST API.
/// Implementations retry transient failures internally; callers consume one
/// rate-limit token per call before invoking these methods.
#[rocket::async_trait]
pub trait ForgeClient: Send + Sync {
    /// Page through the commit list, newest first.
    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
        max_commits: Option<usize>,
    ) -> Result<Vec<CommitSummary>, ForgeError>;

    /// Fetch one full commit with stats and files.
    async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<CommitDetail, ForgeError>;

    /// Cheap commit count probe (Link header, pagination fallback).
    async fn count_commits(&self, owner: &str, repo: &str) -> Result<u64, ForgeError>;

    /// Single authenticated page of repository contributors.
    async fn list_contributors(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ContributorEntry>, ForgeError>;

    /// All pull requests, optionally filtered to a creation window.
    async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<PullEntry>, ForgeError>;

    /// All issues, excluding pull requests duplicated on the issues feed.
    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<IssueEntry>, ForgeError>;
}
