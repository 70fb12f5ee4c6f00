//! Per-session sync state machine.
//!
//! One orchestrator executes one `SyncSession` from `queued` to a terminal
//! status:
//!
//! ```text
//! queued -> running/initializing -> running/fetching_list
//!      -> running/processing_sprint -> running/processing_archive -> completed
//!                            `- on any unrecoverable error -> failed
//! ```
//!
//! The commit list is partitioned by authored date against the sprint cutoff
//! (`now - sprint_days`); the sprint partition is fully drained before the
//! archive partition begins, and `sprint_commits_done` flips exactly once at
//! that barrier. Within a partition, per-commit work is unordered across the
//! worker pool.
//!
//! Per-commit failures append to the session's error list and never abort
//! sibling workers; only failures in prerequisite phases (list fetch,
//! contributor prep) fail the session. Cancellation is observed at phase
//! boundaries.

use crate::enrich::{IgnoreFilter, LanguageDetector, classify_commit};
use crate::forge::types::{CommitSummary, FileEntry};
use crate::forge::{ForgeClient, ForgeError, RateLimiter};
use crate::models::{Repository, VcsProvider};
use crate::settings::AnalysisConfig;
use crate::store::{
    CommitDetailsUpdate, CommitFileStore, CommitStore, ContributorStore, IssueStore,
    NewCommitFile, NewIssue, NewPullRequest, PullRequestStore, SyncSessionStore,
};
use crate::store::sessions::ProgressUpdate;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rocket_db_pools::sqlx::PgPool;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Settings snapshot taken by the dispatcher at admission time. The
/// orchestrator never re-reads team settings mid-run, so a concurrent
/// settings change cannot produce a half-reclassified session.
#[derive(Debug, Clone)]
pub struct SyncSettingsSnapshot {
    pub analysis: AnalysisConfig,
    pub sprint_days: i64,
    pub max_workers: usize,
}

impl Default for SyncSettingsSnapshot {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            sprint_days: 14,
            max_workers: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session cancelled")]
    Cancelled,
}

/// Final result payload persisted on the session row.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub total_commits: usize,
    pub processed_commits: i32,
    pub sprint_commits: usize,
    pub archive_commits: usize,
    pub new_commits: i32,
    pub new_pull_requests: usize,
    pub new_issues: usize,
    pub errors: Vec<String>,
}

/// Live in-memory counters, mutated by workers under one mutex.
#[derive(Debug, Default)]
struct SyncProgress {
    processed_commits: i32,
    new_commits: i32,
    errors: Vec<String>,
}

/// Everything a worker needs, shared once behind an `Arc`.
struct WorkerContext {
    pool: PgPool,
    forge: Arc<dyn ForgeClient>,
    rate_limiter: Arc<RateLimiter>,
    sessions: SyncSessionStore,
    commits: CommitStore,
    commit_files: CommitFileStore,
    session_id: i32,
    repository_id: i32,
    owner: String,
    name: String,
    analysis: AnalysisConfig,
    ignore: IgnoreFilter,
    detector: LanguageDetector,
    contributors: HashMap<String, i32>,
    progress: Mutex<SyncProgress>,
}

/// Executes one sync session end to end.
pub struct SyncOrchestrator {
    pool: PgPool,
    forge: Arc<dyn ForgeClient>,
    rate_limiter: Arc<RateLimiter>,
    session_id: i32,
    repository: Repository,
    settings: SyncSettingsSnapshot,
}

impl SyncOrchestrator {
    pub fn new(
        pool: PgPool,
        forge: Arc<dyn ForgeClient>,
        rate_limiter: Arc<RateLimiter>,
        session_id: i32,
        repository: Repository,
        settings: SyncSettingsSnapshot,
    ) -> Self {
        Self {
            pool,
            forge,
            rate_limiter,
            session_id,
            repository,
            settings,
        }
    }

    /// Run the session to a terminal status. Intended to be spawned as a
    /// detached task: all outcomes land on the session row, nothing is
    /// returned to the caller.
    pub async fn run(self) {
        let sessions = SyncSessionStore::new(self.pool.clone());
        let session_id = self.session_id;

        match self.execute(&sessions).await {
            Ok(summary) => {
                log::info!(
                    "session {}: completed - {} new commits, {} errors",
                    session_id,
                    summary.new_commits,
                    summary.errors.len()
                );
            }
            Err(SyncError::Cancelled) => {
                log::warn!("session {}: cancelled by user, stopping", session_id);
            }
            Err(err) => {
                log::error!("session {}: sync failed: {}", session_id, err);
                // No-op if a phase already finalized the session.
                let _ = sessions
                    .mark_failed(session_id, Utc::now(), &[err.to_string()])
                    .await;
            }
        }
    }

    async fn execute(&self, sessions: &SyncSessionStore) -> Result<SyncSummary, SyncError> {
        let owner = self.repository.owner.clone();
        let name = self.repository.name.clone();

        log::info!(
            "session {}: starting sync for {}/{}",
            self.session_id,
            owner,
            name
        );

        sessions.mark_running(self.session_id, Utc::now()).await?;
        self.set_phase(sessions, "initializing").await?;

        // Full discovery: no `since`, the per-repository SHA index handles
        // deduplication.
        self.set_phase(sessions, "fetching_list").await?;
        self.rate_limiter.acquire(1).await;
        let discovered = match self.forge.list_commits(&owner, &name, None, None).await {
            Ok(list) => list,
            Err(err) => {
                let message = format!("Failed to fetch commits: {err}");
                sessions
                    .mark_failed(self.session_id, Utc::now(), &[message])
                    .await?;
                return Err(err.into());
            }
        };

        let total_commits = discovered.len();
        sessions
            .update_progress(
                self.session_id,
                &ProgressUpdate {
                    total_commits: Some(total_commits as i32),
                    ..ProgressUpdate::default()
                },
            )
            .await?;

        let cutoff = Utc::now() - ChronoDuration::days(self.settings.sprint_days);
        let (sprint_commits, archive_commits) = partition_commits(discovered, cutoff);
        log::info!(
            "session {}: split commits: {} sprint, {} archive (total {})",
            self.session_id,
            sprint_commits.len(),
            archive_commits.len(),
            total_commits
        );

        self.ensure_not_cancelled(sessions).await?;

        let contributors = self.prepare_contributors(&owner, &name).await?;

        let detector = match LanguageDetector::load(&self.pool).await {
            Ok(detector) => detector,
            Err(err) => {
                log::warn!(
                    "session {}: failed to load file_extensions, using builtin table: {}",
                    self.session_id,
                    err
                );
                LanguageDetector::with_builtin()
            }
        };

        let commit_store = CommitStore::new(self.pool.clone());
        let existing_shas = commit_store.existing_shas(self.repository.id).await?;

        // Team-scoped patterns, optionally extended by a repository-root
        // style ignore file.
        let mut ignore_patterns = self.settings.analysis.file_filters.exclude_patterns.clone();
        if let Ok(path) = std::env::var("IGNORE_PATTERNS_FILE") {
            match IgnoreFilter::load_patterns(std::path::Path::new(&path)) {
                Ok(extra) => ignore_patterns.extend(extra),
                Err(err) => log::warn!(
                    "session {}: could not read ignore patterns from {}: {}",
                    self.session_id,
                    path,
                    err
                ),
            }
        }

        let ctx = Arc::new(WorkerContext {
            pool: self.pool.clone(),
            forge: self.forge.clone(),
            rate_limiter: self.rate_limiter.clone(),
            sessions: SyncSessionStore::new(self.pool.clone()),
            commits: commit_store,
            commit_files: CommitFileStore::new(self.pool.clone()),
            session_id: self.session_id,
            repository_id: self.repository.id,
            owner: owner.clone(),
            name: name.clone(),
            analysis: self.settings.analysis.clone(),
            ignore: IgnoreFilter::new(ignore_patterns),
            detector,
            contributors,
            progress: Mutex::new(SyncProgress::default()),
        });

        let sprint_count = sprint_commits.len();
        let archive_count = archive_commits.len();

        // Sprint partition first: recent data becomes durable before any
        // archive work starts.
        self.ensure_not_cancelled(sessions).await?;
        self.set_phase(sessions, "processing_sprint").await?;
        self.process_partition(&ctx, sprint_commits, &existing_shas).await;

        sessions
            .update_progress(
                self.session_id,
                &ProgressUpdate {
                    sprint_commits_done: Some(true),
                    ..ProgressUpdate::default()
                },
            )
            .await?;
        log::info!("session {}: sprint partition drained", self.session_id);

        self.ensure_not_cancelled(sessions).await?;
        self.set_phase(sessions, "processing_archive").await?;
        self.process_partition(&ctx, archive_commits, &existing_shas).await;

        // PR and issue backfill is best-effort: failures are logged, never
        // fatal.
        let (new_pull_requests, new_issues) = self.backfill_pulls_and_issues(&ctx).await;

        self.set_phase(sessions, "complete").await?;

        let (processed_commits, new_commits, errors) = {
            let progress = ctx.progress.lock();
            (
                progress.processed_commits,
                progress.new_commits,
                progress.errors.clone(),
            )
        };

        let summary = SyncSummary {
            total_commits,
            processed_commits,
            sprint_commits: sprint_count,
            archive_commits: archive_count,
            new_commits,
            new_pull_requests,
            new_issues,
            errors: errors.clone(),
        };

        let result =
            serde_json::to_value(&summary).unwrap_or_else(|_| serde_json::Value::Null);
        sessions
            .mark_completed(self.session_id, Utc::now(), result, new_commits, &errors)
            .await?;

        Ok(summary)
    }

    /// Upsert the contributor list and build the login -> id map used to
    /// attribute commits, PRs and issues.
    async fn prepare_contributors(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<HashMap<String, i32>, SyncError> {
        self.rate_limiter.acquire(1).await;
        let entries = self.forge.list_contributors(owner, name).await?;

        let store = ContributorStore::new(self.pool.clone());
        let mut map = HashMap::with_capacity(entries.len());

        for entry in entries {
            let profile_url = entry.html_url.as_deref().or(entry.avatar_url.as_deref());
            let (contributor, _created) = store
                .get_or_create(
                    VcsProvider::Github,
                    &entry.id.to_string(),
                    Some(&entry.login),
                    profile_url,
                )
                .await?;
            map.insert(entry.login, contributor.id);
        }

        log::info!(
            "session {}: prepared {} contributors",
            self.session_id,
            map.len()
        );
        Ok(map)
    }

    /// Fan one partition out across the bounded worker pool and wait for it
    /// to drain. Commits whose SHA is already persisted are skipped without
    /// counting as processed or new.
    async fn process_partition(
        &self,
        ctx: &Arc<WorkerContext>,
        commits: Vec<CommitSummary>,
        existing_shas: &HashSet<String>,
    ) {
        let total = commits.len();
        let to_process: Vec<CommitSummary> = commits
            .into_iter()
            .filter(|c| !existing_shas.contains(&c.sha))
            .collect();

        let skipped = total - to_process.len();
        if skipped > 0 {
            log::info!(
                "session {}: skipping {} existing commits",
                self.session_id,
                skipped
            );
        }
        if to_process.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_workers));
        let mut workers: JoinSet<()> = JoinSet::new();

        for summary in to_process {
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                run_worker(ctx, summary).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                log::error!("session {}: worker panicked: {}", self.session_id, err);
            }
        }
    }

    /// Mirror pull requests and issues by `(repository, number)`. PR state
    /// is rewritten to `merged` when `merged_at` is set.
    async fn backfill_pulls_and_issues(&self, ctx: &Arc<WorkerContext>) -> (usize, usize) {
        let pr_store = PullRequestStore::new(self.pool.clone());
        let issue_store = IssueStore::new(self.pool.clone());

        let mut new_pulls = 0;
        let mut new_issues = 0;

        self.rate_limiter.acquire(1).await;
        match self.forge.list_pulls(&ctx.owner, &ctx.name, None, None).await {
            Ok(pulls) => {
                for pull in pulls {
                    let state = if pull.merged_at.is_some() {
                        "merged".to_string()
                    } else {
                        pull.state.clone().unwrap_or_else(|| "open".to_string())
                    };
                    let author_login = pull.user.as_ref().map(|u| u.login.clone());
                    let contributor_id = author_login
                        .as_deref()
                        .and_then(|login| ctx.contributors.get(login).copied());

                    let new = NewPullRequest {
                        repository_id: ctx.repository_id,
                        contributor_id,
                        external_id: Some(pull.id),
                        number: pull.number,
                        title: pull.title.unwrap_or_default(),
                        state,
                        author_login,
                        author_avatar: pull.user.and_then(|u| u.avatar_url),
                        pr_created_at: pull.created_at,
                        pr_closed_at: pull.closed_at,
                        pr_merged_at: pull.merged_at,
                    };

                    match pr_store.get_or_create(&new).await {
                        Ok((_, true)) => new_pulls += 1,
                        Ok((_, false)) => {}
                        Err(err) => log::warn!(
                            "session {}: failed to persist PR #{}: {}",
                            self.session_id,
                            new.number,
                            err
                        ),
                    }
                }
            }
            Err(err) => log::warn!(
                "session {}: failed to fetch pull requests for {}/{}: {}",
                self.session_id,
                ctx.owner,
                ctx.name,
                err
            ),
        }

        self.rate_limiter.acquire(1).await;
        match self.forge.list_issues(&ctx.owner, &ctx.name, None).await {
            Ok(issues) => {
                for issue in issues {
                    let author_login = issue.user.as_ref().map(|u| u.login.clone());
                    let contributor_id = author_login
                        .as_deref()
                        .and_then(|login| ctx.contributors.get(login).copied());

                    let new = NewIssue {
                        repository_id: ctx.repository_id,
                        contributor_id,
                        external_id: Some(issue.id),
                        number: issue.number,
                        title: issue.title.unwrap_or_default(),
                        state: issue.state.unwrap_or_else(|| "open".to_string()),
                        author_login,
                        author_avatar: issue.user.and_then(|u| u.avatar_url),
                        issue_created_at: issue.created_at,
                        issue_closed_at: issue.closed_at,
                    };

                    match issue_store.get_or_create(&new).await {
                        Ok((_, true)) => new_issues += 1,
                        Ok((_, false)) => {}
                        Err(err) => log::warn!(
                            "session {}: failed to persist issue #{}: {}",
                            self.session_id,
                            new.number,
                            err
                        ),
                    }
                }
            }
            Err(err) => log::warn!(
                "session {}: failed to fetch issues for {}/{}: {}",
                self.session_id,
                ctx.owner,
                ctx.name,
                err
            ),
        }

        log::info!(
            "session {}: backfilled {} PRs and {} issues",
            self.session_id,
            new_pulls,
            new_issues
        );
        (new_pulls, new_issues)
    }

    async fn set_phase(
        &self,
        sessions: &SyncSessionStore,
        phase: &str,
    ) -> Result<(), SyncError> {
        sessions
            .update_progress(
                self.session_id,
                &ProgressUpdate {
                    current_phase: Some(phase.to_string()),
                    ..ProgressUpdate::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn ensure_not_cancelled(&self, sessions: &SyncSessionStore) -> Result<(), SyncError> {
        if sessions.is_cancelled(self.session_id).await? {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

/// Split discovered commits into sprint and archive partitions against the
/// cutoff. The boundary instant itself belongs to the sprint; entries with a
/// missing or unparsable date go to the archive. Per-partition order is
/// preserved.
pub(crate) fn partition_commits(
    commits: Vec<CommitSummary>,
    cutoff: DateTime<Utc>,
) -> (Vec<CommitSummary>, Vec<CommitSummary>) {
    let mut sprint = Vec::new();
    let mut archive = Vec::new();

    for commit in commits {
        match commit.authored_at() {
            Some(date) if date >= cutoff => sprint.push(commit),
            _ => archive.push(commit),
        }
    }

    (sprint, archive)
}

/// One worker: fetch the commit detail, enrich, persist in a single
/// transaction, then advance the shared counters. Failures are recorded on
/// the session and never propagate to siblings.
async fn run_worker(ctx: Arc<WorkerContext>, summary: CommitSummary) {
    let sha = summary.sha.clone();
    let outcome = process_single_commit(&ctx, summary).await;

    let (processed, new_commits) = {
        let mut progress = ctx.progress.lock();
        match outcome {
            Ok(created) => {
                if created {
                    progress.new_commits += 1;
                }
            }
            Err(err) => {
                let short = short_sha(&sha);
                log::error!(
                    "session {}: failed to process commit {}: {}",
                    ctx.session_id,
                    short,
                    err
                );
                progress.errors.push(format!("{short}: {err}"));
            }
        }
        progress.processed_commits += 1;
        (progress.processed_commits, progress.new_commits)
    };

    if let Err(err) = ctx
        .sessions
        .advance_counters(ctx.session_id, processed, new_commits)
        .await
    {
        log::warn!(
            "session {}: failed to flush progress: {}",
            ctx.session_id,
            err
        );
    }
}

/// Fetch, enrich and persist one commit. Returns whether the base row was
/// newly created.
async fn process_single_commit(
    ctx: &WorkerContext,
    summary: CommitSummary,
) -> Result<bool, SyncError> {
    ctx.rate_limiter.acquire(1).await;
    let detail = ctx.forge.get_commit(&ctx.owner, &ctx.name, &summary.sha).await?;

    let kept_files: Vec<&FileEntry> = detail
        .files
        .iter()
        .filter(|file| ctx.ignore.is_allowed(&file.filename))
        .collect();

    let enrichment = classify_commit(
        &detail.commit.message,
        detail.parents.len(),
        Some(kept_files.len()),
        &ctx.analysis,
    );

    let login = detail
        .author
        .as_ref()
        .or(summary.author.as_ref())
        .map(|account| account.login.clone());
    let contributor_id = login
        .as_deref()
        .and_then(|login| ctx.contributors.get(login).copied());

    let update = CommitDetailsUpdate {
        authored_at: detail.commit.author.as_ref().and_then(|a| a.parsed_date()),
        committed_at: detail.commit.committer.as_ref().and_then(|c| c.parsed_date()),
        author_name: detail.commit.author.as_ref().and_then(|a| a.name.clone()),
        author_email: detail.commit.author.as_ref().and_then(|a| a.email.clone()),
        additions: detail.stats.as_ref().and_then(|s| s.additions),
        deletions: detail.stats.as_ref().and_then(|s| s.deletions),
        changes: detail.stats.as_ref().and_then(|s| s.total),
        commit_type: Some(enrichment.commit_type.clone()),
        is_conventional: Some(enrichment.is_conventional),
        conventional_type: Some(enrichment.conventional_type.clone()),
        conventional_scope: Some(enrichment.conventional_scope.clone()),
        is_breaking_change: Some(enrichment.is_breaking_change),
        is_merge_commit: Some(enrichment.is_merge_commit),
        is_pr_commit: Some(enrichment.is_pr_commit),
        is_revert_commit: Some(enrichment.is_revert_commit),
        parents_count: Some(enrichment.parents_count),
        files_changed: enrichment.files_changed,
    };

    let file_rows: Vec<NewCommitFile> = kept_files
        .iter()
        .map(|file| NewCommitFile {
            file_path: file.filename.clone(),
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes.or_else(|| match (file.additions, file.deletions) {
                (Some(a), Some(d)) => Some(a + d),
                _ => None,
            }),
            language: Some(ctx.detector.detect(&file.filename).to_string()),
            patch: file.patch.clone(),
        })
        .collect();

    // One unit of work per commit: base row, enrichment, file rows.
    let mut tx = ctx.pool.begin().await?;

    let (commit_id, created) = ctx
        .commits
        .get_or_create(
            &mut tx,
            ctx.repository_id,
            &detail.sha,
            &detail.commit.message,
            contributor_id,
        )
        .await?;

    ctx.commits.update_details(&mut tx, commit_id, &update).await?;
    ctx.commit_files.delete_by_commit_id(&mut tx, commit_id).await?;
    ctx.commit_files.bulk_create(&mut tx, commit_id, &file_rows).await?;

    tx.commit().await?;

    log::debug!(
        "session {}: processed commit {} for {}/{}",
        ctx.session_id,
        short_sha(&detail.sha),
        ctx.owner,
        ctx.name
    );

    Ok(created)
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::types::{CommitSignature, GitSignature};
    use chrono::TimeZone;

    fn summary(sha: &str, date: Option<&str>) -> CommitSummary {
        CommitSummary {
            sha: sha.to_string(),
            commit: CommitSignature {
                author: Some(GitSignature {
                    name: Some("Dev".to_string()),
                    email: Some("dev@example.com".to_string()),
                    date: date.map(str::to_string),
                }),
                committer: None,
                message: "feat: change".to_string(),
            },
            author: None,
        }
    }

    #[test]
    fn partition_boundary_is_inclusive_for_sprint() {
        let cutoff = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();

        let (sprint, archive) = partition_commits(
            vec![
                summary("new", Some("2026-02-15T00:00:01Z")),
                summary("boundary", Some("2026-02-15T00:00:00Z")),
                summary("old", Some("2026-02-14T23:59:59Z")),
            ],
            cutoff,
        );

        let sprint_shas: Vec<&str> = sprint.iter().map(|c| c.sha.as_str()).collect();
        let archive_shas: Vec<&str> = archive.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(sprint_shas, vec!["new", "boundary"]);
        assert_eq!(archive_shas, vec!["old"]);
    }

    #[test]
    fn missing_or_unparsable_dates_go_to_archive() {
        let cutoff = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();

        let (sprint, archive) = partition_commits(
            vec![
                summary("undated", None),
                summary("garbled", Some("not-a-date")),
                summary("recent", Some("2026-02-20T12:00:00Z")),
            ],
            cutoff,
        );

        assert_eq!(sprint.len(), 1);
        assert_eq!(sprint[0].sha, "recent");
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn partition_preserves_input_order() {
        let cutoff = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();

        let (sprint, _) = partition_commits(
            vec![
                summary("c3", Some("2026-02-18T00:00:00Z")),
                summary("c2", Some("2026-02-17T00:00:00Z")),
                summary("c1", Some("2026-02-16T00:00:00Z")),
            ],
            cutoff,
        );

        let shas: Vec<&str> = sprint.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["c3", "c2", "c1"]);
    }

    #[test]
    fn short_sha_handles_tiny_inputs() {
        assert_eq!(short_sha("abcdef0123456789"), "abcdef0");
        assert_eq!(short_sha("abc"), "abc");
    }
}
