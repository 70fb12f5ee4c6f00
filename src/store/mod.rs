//! Typed repositories over the relational store.
//!
//! One store struct per entity, each wrapping the shared `PgPool`. Mutations
//! commit synchronously; the per-commit write path takes an explicit
//! connection so the orchestrator can group get-or-create, detail update and
//! file rows into a single transaction. For the entities the sync pipeline
//! creates (contributors, commits, pull requests, issues), `get_or_create`
//! is the only create path and its `created` flag reflects the actual
//! outcome. Repository and team rows are owned by the collaborator CRUD
//! surface and are only read here.

pub mod commit_files;
pub mod commits;
pub mod contributors;
pub mod issues;
pub mod pull_requests;
pub mod repositories;
pub mod sessions;
pub mod teams;

pub use commit_files::{CommitFileStore, NewCommitFile};
pub use commits::{CommitDetailsUpdate, CommitStore};
pub use contributors::ContributorStore;
pub use issues::{IssueStore, NewIssue};
pub use pull_requests::{NewPullRequest, PullRequestStore};
pub use repositories::RepositoryStore;
pub use sessions::{ProgressUpdate, SyncSession, SyncSessionStore, SyncStatus};
pub use teams::{TeamRow, TeamStore};
