//! Sprint analytics over the enriched store.
//!
//! Daily-bucketed time series plus a per-contributor ranking scored by the
//! Developer Quality Index. The window is either a number of days or the
//! sentinel `all`, which means "the most recent 5,000 commits regardless of
//! age" (the daily buckets are then re-derived from the truncated set).

use crate::error::ApiError;
use crate::models::{ApiResponse, Contributor, ResponseMeta, VcsProvider};
use crate::routes::helpers::require_team;
use crate::settings::{TeamSettings, commit_weight};
use crate::store::{
    CommitFileStore, CommitStore, ContributorStore, IssueStore, PullRequestStore,
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Commit types counted as feature work for the quality index.
const FEATURE_TYPES: &[&str] = &["feat", "perf", "refactor"];

const ALL_MODE_COMMIT_LIMIT: usize = 5000;
const ALL_MODE_MAX_BUCKET_DAYS: i64 = 365;

/// Window metadata for the analytics payload.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PeriodInfo {
    pub preset: String,
    pub start_date: String,
    pub end_date: String,
    pub total_commits: usize,
    pub limited: bool,
    pub limit: Option<usize>,
}

/// Sprint framing of the same window.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SprintInfo {
    pub duration_days: Option<i64>,
    pub start_date: String,
    pub end_date: String,
}

/// Compact commit summary inside a daily bucket.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommitDigest {
    pub sha: String,
    pub short_sha: String,
    pub message: String,
    pub commit_type: String,
    pub author_login: String,
    pub author_avatar: Option<String>,
    pub additions: i32,
    pub deletions: i32,
    pub files_changed: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PullRequestDigest {
    pub number: i32,
    pub title: String,
    pub state: String,
    pub author_login: String,
    pub author_avatar: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IssueDigest {
    pub number: i32,
    pub title: String,
    pub state: String,
    pub author_login: String,
    pub author_avatar: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One calendar day of team activity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DailyBucket {
    pub date: String,
    pub commit_count: i64,
    pub additions: i64,
    pub deletions: i64,
    pub pr_count: i64,
    pub issue_count: i64,
    pub commits: Vec<CommitDigest>,
    pub pull_requests: Vec<PullRequestDigest>,
    pub issues: Vec<IssueDigest>,
}

impl DailyBucket {
    fn empty(date: String) -> Self {
        Self {
            date,
            commit_count: 0,
            additions: 0,
            deletions: 0,
            pr_count: 0,
            issue_count: 0,
            commits: Vec::new(),
            pull_requests: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// Per-contributor accumulator and final ranking entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContributorStats {
    pub login: String,
    pub avatar_url: Option<String>,
    pub total_commits: i64,
    pub commits_by_type: BTreeMap<String, i64>,
    pub total_additions: i64,
    pub total_deletions: i64,
    pub significant_commits: i64,
    pub weighted_score: f64,
    pub quality_index: f64,
    pub prs_opened: i64,
    pub prs_merged: i64,
    pub issues_opened: i64,
}

impl ContributorStats {
    fn new(login: String, avatar_url: Option<String>) -> Self {
        Self {
            login,
            avatar_url,
            total_commits: 0,
            commits_by_type: BTreeMap::new(),
            total_additions: 0,
            total_deletions: 0,
            significant_commits: 0,
            weighted_score: 0.0,
            quality_index: 0.0,
            prs_opened: 0,
            prs_merged: 0,
            issues_opened: 0,
        }
    }
}

/// Totals across the whole window.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SprintSummary {
    pub total_commits: i64,
    pub total_additions: i64,
    pub active_days: i64,
    pub unique_contributors: usize,
    pub total_prs: usize,
    pub total_issues: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SprintStatsResponse {
    pub period_info: PeriodInfo,
    pub sprint: SprintInfo,
    pub daily_stats: Vec<DailyBucket>,
    pub contributors: Vec<ContributorStats>,
    pub summary: SprintSummary,
}

/// Developer Quality Index, 0-100.
///
/// `DQI = (0.5 * functional_ratio + 0.3 * (1 - bug_rate)
///         + 0.2 * significant_ratio) * 100`, rounded to one decimal and
/// clamped to 100. Zero commits yield zero.
fn calc_dqi(
    commits_by_type: &BTreeMap<String, i64>,
    total_commits: i64,
    significant_commits: i64,
) -> f64 {
    if total_commits == 0 {
        return 0.0;
    }

    let feat_count: i64 = FEATURE_TYPES
        .iter()
        .map(|t| commits_by_type.get(*t).copied().unwrap_or(0))
        .sum();
    let fix_count = commits_by_type.get("fix").copied().unwrap_or(0);

    let functional_ratio = feat_count as f64 / total_commits as f64;
    let denominator = feat_count + fix_count;
    let bug_rate = if denominator > 0 {
        fix_count as f64 / denominator as f64
    } else {
        0.0
    };
    let significant_ratio = significant_commits as f64 / total_commits as f64;

    let dqi =
        (functional_ratio * 0.5 + (1.0 - bug_rate) * 0.3 + significant_ratio * 0.2) * 100.0;
    round1(dqi.min(100.0))
}

/// Per-commit quality score for the contributor listing: weighted additions
/// scaled by a type multiplier, clamped to 100.
fn quality_score(additions: i32, commit_type: &str, weight: f64) -> i32 {
    let multiplier = if FEATURE_TYPES.contains(&commit_type) {
        1.2
    } else if commit_type == "fix" {
        1.0
    } else {
        0.8
    };

    let raw = f64::from(additions.max(0)) * weight;
    ((raw / 10.0 * multiplier) as i32).min(100)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn first_line_truncated(message: &str, max_chars: usize) -> String {
    message
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(max_chars)
        .collect()
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

struct ContributorLookup {
    by_id: HashMap<i32, (String, Option<String>)>,
}

impl ContributorLookup {
    fn new(contributors: Vec<Contributor>) -> Self {
        let by_id = contributors
            .into_iter()
            .map(|c| {
                let login = c.login.unwrap_or(c.external_id);
                (c.id, (login, c.profile_url))
            })
            .collect();
        Self { by_id }
    }

    fn resolve(&self, contributor_id: Option<i32>) -> Option<&(String, Option<String>)> {
        contributor_id.and_then(|id| self.by_id.get(&id))
    }
}

#[openapi(tag = "Stats")]
#[get("/stats/team/<team_id>/sprint-stats?<days>")]
pub async fn sprint_stats(
    team_id: i32,
    days: Option<String>,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<SprintStatsResponse>>, ApiError> {
    let team = require_team(pool.inner(), team_id).await?;
    let settings = TeamSettings::resolve(
        team.analysis_config.as_deref(),
        team.workflow_config.as_deref(),
        team.metrics_config.as_deref(),
    );

    let default_sprint_days = settings.workflow.sprint.duration_days;
    let significant_min_lines = settings.metrics.significant_commit_min_lines;

    let is_all_time = days.as_deref() == Some("all");
    let sprint_days = match days.as_deref() {
        Some("all") | None => default_sprint_days,
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ApiError::BadRequest(format!("Invalid days value '{raw}', expected a number or 'all'"))
        })?,
    };

    let until = Utc::now();
    let since = if is_all_time {
        // Epoch-like sentinel; the real window is re-derived after the
        // commit limit is applied.
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    } else {
        until - ChronoDuration::days(sprint_days)
    };

    let commit_store = CommitStore::new(pool.inner().clone());
    let mut commits = commit_store
        .get_by_team_date_range(team_id, since, until)
        .await?;

    let mut limited = false;
    if is_all_time && commits.len() > ALL_MODE_COMMIT_LIMIT {
        commits.sort_by(|a, b| b.authored_at.cmp(&a.authored_at));
        commits.truncate(ALL_MODE_COMMIT_LIMIT);
        limited = true;
    }

    let dated: Vec<DateTime<Utc>> = commits.iter().filter_map(|c| c.authored_at).collect();
    let (actual_since, actual_until) = match (dated.iter().min(), dated.iter().max()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => (since, until),
    };

    let prs = PullRequestStore::new(pool.inner().clone())
        .get_by_team_date_range(team_id, actual_since, actual_until)
        .await?;
    let issues = IssueStore::new(pool.inner().clone())
        .get_by_team_date_range(team_id, actual_since, actual_until)
        .await?;

    let lookup = ContributorLookup::new(
        ContributorStore::new(pool.inner().clone())
            .get_all(10_000)
            .await?,
    );

    // One empty bucket per calendar day; ISO date keys keep the BTreeMap in
    // chronological order.
    let mut daily: BTreeMap<String, DailyBucket> = BTreeMap::new();
    if is_all_time {
        if !commits.is_empty() {
            let span_days =
                (actual_until.date_naive() - actual_since.date_naive()).num_days() + 1;
            for offset in 0..span_days.min(ALL_MODE_MAX_BUCKET_DAYS) {
                let day = (actual_since + ChronoDuration::days(offset))
                    .date_naive()
                    .to_string();
                daily.insert(day.clone(), DailyBucket::empty(day));
            }
        }
    } else {
        for offset in 0..sprint_days {
            let day = (since + ChronoDuration::days(offset)).date_naive().to_string();
            daily.insert(day.clone(), DailyBucket::empty(day));
        }
    }

    let mut contributor_stats: HashMap<String, ContributorStats> = HashMap::new();

    for commit in &commits {
        let Some(authored_at) = commit.authored_at else {
            continue;
        };
        let day = authored_at.date_naive().to_string();
        let Some(bucket) = daily.get_mut(&day) else {
            continue;
        };

        let resolved = lookup.resolve(commit.contributor_id);
        let login = resolved
            .map(|(login, _)| login.clone())
            .or_else(|| commit.author_name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let avatar = resolved.and_then(|(_, avatar)| avatar.clone());

        let commit_type = commit
            .commit_type
            .clone()
            .unwrap_or_else(|| "chore".to_string());
        let additions = commit.additions.unwrap_or(0);
        let deletions = commit.deletions.unwrap_or(0);

        bucket.commit_count += 1;
        bucket.additions += i64::from(additions);
        bucket.deletions += i64::from(deletions);
        bucket.commits.push(CommitDigest {
            sha: commit.sha.clone(),
            short_sha: short_sha(&commit.sha),
            message: first_line_truncated(&commit.message, 120),
            commit_type: commit_type.clone(),
            author_login: login.clone(),
            author_avatar: avatar.clone(),
            additions,
            deletions,
            files_changed: commit.files_changed.unwrap_or(0),
        });

        let entry = contributor_stats
            .entry(login.clone())
            .or_insert_with(|| ContributorStats::new(login, avatar));
        entry.total_commits += 1;
        *entry.commits_by_type.entry(commit_type.clone()).or_insert(0) += 1;
        entry.total_additions += i64::from(additions);
        entry.total_deletions += i64::from(deletions);

        if i64::from(additions) >= significant_min_lines {
            entry.significant_commits += 1;
        }
        entry.weighted_score +=
            f64::from(additions) * commit_weight(&settings.metrics, &commit_type);
    }

    for pr in &prs {
        let Some(created_at) = pr.pr_created_at else {
            continue;
        };
        let day = created_at.date_naive().to_string();
        let Some(bucket) = daily.get_mut(&day) else {
            continue;
        };

        let login = pr
            .author_login
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        bucket.pr_count += 1;
        bucket.pull_requests.push(PullRequestDigest {
            number: pr.number,
            title: first_line_truncated(&pr.title, 120),
            state: pr.state.clone(),
            author_login: login.clone(),
            author_avatar: pr.author_avatar.clone(),
            created_at: pr.pr_created_at,
            merged_at: pr.pr_merged_at,
        });

        if let Some(entry) = contributor_stats.get_mut(&login) {
            entry.prs_opened += 1;
            if pr.state == "merged" {
                entry.prs_merged += 1;
            }
        }
    }

    for issue in &issues {
        let Some(created_at) = issue.issue_created_at else {
            continue;
        };
        let day = created_at.date_naive().to_string();
        let Some(bucket) = daily.get_mut(&day) else {
            continue;
        };

        let login = issue
            .author_login
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        bucket.issue_count += 1;
        bucket.issues.push(IssueDigest {
            number: issue.number,
            title: first_line_truncated(&issue.title, 120),
            state: issue.state.clone(),
            author_login: login.clone(),
            author_avatar: issue.author_avatar.clone(),
            created_at: issue.issue_created_at,
            closed_at: issue.issue_closed_at,
        });

        if let Some(entry) = contributor_stats.get_mut(&login) {
            entry.issues_opened += 1;
        }
    }

    let mut contributors: Vec<ContributorStats> = contributor_stats
        .into_values()
        .map(|mut stats| {
            stats.quality_index = calc_dqi(
                &stats.commits_by_type,
                stats.total_commits,
                stats.significant_commits,
            );
            stats.weighted_score = round1(stats.weighted_score);
            stats
        })
        .collect();
    contributors.sort_by(|a, b| {
        b.quality_index
            .partial_cmp(&a.quality_index)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total_commits: i64 = daily.values().map(|d| d.commit_count).sum();
    let total_additions: i64 = daily.values().map(|d| d.additions).sum();
    let active_days = daily.values().filter(|d| d.commit_count > 0).count() as i64;

    let (window_start, window_end) = if commits.is_empty() {
        (since, until)
    } else {
        (actual_since, actual_until)
    };

    let response = SprintStatsResponse {
        period_info: PeriodInfo {
            preset: if is_all_time {
                "all".to_string()
            } else {
                sprint_days.to_string()
            },
            start_date: window_start.date_naive().to_string(),
            end_date: window_end.date_naive().to_string(),
            total_commits: commits.len(),
            limited,
            limit: limited.then_some(ALL_MODE_COMMIT_LIMIT),
        },
        sprint: SprintInfo {
            duration_days: (!is_all_time).then_some(sprint_days),
            start_date: window_start.date_naive().to_string(),
            end_date: window_end.date_naive().to_string(),
        },
        daily_stats: daily.into_values().collect(),
        summary: SprintSummary {
            total_commits,
            total_additions,
            active_days,
            unique_contributors: contributors.len(),
            total_prs: prs.len(),
            total_issues: issues.len(),
        },
        contributors,
    };

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(response, meta)))
}

/// File detail inside the commit details payload.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CommitFileDetail {
    pub file_path: String,
    pub additions: i32,
    pub deletions: i32,
    pub language: Option<String>,
    pub patch: Option<String>,
}

/// Full commit view with enrichment flags and per-file changes.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CommitDetailsResponse {
    pub sha: String,
    pub short_sha: String,
    pub message: String,
    pub commit_type: Option<String>,
    pub is_conventional: bool,
    pub is_merge_commit: bool,
    pub is_pr_commit: bool,
    pub is_revert_commit: bool,
    pub is_breaking_change: bool,
    pub authored_at: Option<DateTime<Utc>>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_login: Option<String>,
    pub author_avatar: Option<String>,
    pub additions: i32,
    pub deletions: i32,
    pub changes: i32,
    pub files_changed: i32,
    pub files: Vec<CommitFileDetail>,
}

#[openapi(tag = "Stats")]
#[get("/stats/commit/<sha>/details")]
pub async fn commit_details(
    sha: String,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<CommitDetailsResponse>>, ApiError> {
    let commit = CommitStore::new(pool.inner().clone())
        .get_by_sha(&sha)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Commit {sha} not found")))?;

    let files = CommitFileStore::new(pool.inner().clone())
        .get_by_commit(commit.id)
        .await?;

    let contributor = match commit.contributor_id {
        Some(id) => ContributorStore::new(pool.inner().clone()).get_by_id(id).await?,
        None => None,
    };

    let response = CommitDetailsResponse {
        short_sha: short_sha(&commit.sha),
        sha: commit.sha,
        message: commit.message,
        commit_type: commit.commit_type,
        is_conventional: commit.is_conventional.unwrap_or(false),
        is_merge_commit: commit.is_merge_commit.unwrap_or(false),
        is_pr_commit: commit.is_pr_commit.unwrap_or(false),
        is_revert_commit: commit.is_revert_commit.unwrap_or(false),
        is_breaking_change: commit.is_breaking_change.unwrap_or(false),
        authored_at: commit.authored_at,
        author_name: commit.author_name,
        author_email: commit.author_email,
        author_login: contributor.as_ref().and_then(|c| c.login.clone()),
        author_avatar: contributor.and_then(|c| c.profile_url),
        additions: commit.additions.unwrap_or(0),
        deletions: commit.deletions.unwrap_or(0),
        changes: commit.changes.unwrap_or(0),
        files_changed: commit.files_changed.unwrap_or(0),
        files: files
            .into_iter()
            .map(|f| CommitFileDetail {
                file_path: f.file_path,
                additions: f.additions.unwrap_or(0),
                deletions: f.deletions.unwrap_or(0),
                language: f.language,
                patch: f.patch,
            })
            .collect(),
    };

    Ok(Json(ApiResponse::new(response)))
}

/// One scored commit in the contributor listing.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ScoredCommit {
    pub sha: String,
    pub short_sha: String,
    pub message: String,
    pub commit_type: String,
    pub quality_score: i32,
    pub additions: i32,
    pub deletions: i32,
    pub changes: i32,
    pub files_changed: i32,
    pub authored_at: Option<DateTime<Utc>>,
    pub is_significant: bool,
    pub is_conventional: bool,
    pub is_breaking_change: bool,
    pub is_merge_commit: bool,
    pub is_revert_commit: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ContributorProfile {
    pub login: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PeriodWindow {
    pub days: i64,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PaginationEcho {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ContributorCommitsResponse {
    pub contributor: ContributorProfile,
    pub commits: Vec<ScoredCommit>,
    pub total: usize,
    pub period: PeriodWindow,
    pub pagination: PaginationEcho,
}

#[openapi(tag = "Stats")]
#[get("/stats/team/<team_id>/contributor/<login>/commits?<days>&<limit>&<offset>")]
pub async fn contributor_commits(
    team_id: i32,
    login: String,
    days: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<ContributorCommitsResponse>>, ApiError> {
    let team = require_team(pool.inner(), team_id).await?;
    let settings = TeamSettings::resolve(
        team.analysis_config.as_deref(),
        team.workflow_config.as_deref(),
        team.metrics_config.as_deref(),
    );

    let contributor = ContributorStore::new(pool.inner().clone())
        .get_by_login(&login, VcsProvider::Github)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Contributor {login} not found")))?;

    let sprint_days = days.unwrap_or(settings.workflow.sprint.duration_days);
    let limit = limit.unwrap_or(100).clamp(1, 1000);
    let offset = offset.unwrap_or(0).max(0);

    let until = Utc::now();
    let since = until - ChronoDuration::days(sprint_days);

    let commits = CommitStore::new(pool.inner().clone())
        .get_by_contributor_and_team(contributor.id, team_id, since, until, limit, offset)
        .await?;

    let significant_min_lines = settings.metrics.significant_commit_min_lines;

    let scored: Vec<ScoredCommit> = commits
        .iter()
        .map(|commit| {
            let commit_type = commit
                .commit_type
                .clone()
                .unwrap_or_else(|| "other".to_string());
            let additions = commit.additions.unwrap_or(0);
            let deletions = commit.deletions.unwrap_or(0);
            let weight = commit_weight(&settings.metrics, &commit_type);

            ScoredCommit {
                sha: commit.sha.clone(),
                short_sha: short_sha(&commit.sha),
                message: first_line_truncated(&commit.message, 120),
                quality_score: quality_score(additions, &commit_type, weight),
                commit_type,
                additions,
                deletions,
                changes: commit.changes.unwrap_or(additions + deletions),
                files_changed: commit.files_changed.unwrap_or(0),
                authored_at: commit.authored_at,
                is_significant: i64::from(additions) >= significant_min_lines,
                is_conventional: commit.is_conventional.unwrap_or(false),
                is_breaking_change: commit.is_breaking_change.unwrap_or(false),
                is_merge_commit: commit.is_merge_commit.unwrap_or(false),
                is_revert_commit: commit.is_revert_commit.unwrap_or(false),
            }
        })
        .collect();

    let response = ContributorCommitsResponse {
        contributor: ContributorProfile {
            login: contributor.login,
            display_name: contributor.display_name,
            avatar_url: contributor.profile_url,
            email: contributor.email,
        },
        total: scored.len(),
        commits: scored,
        period: PeriodWindow {
            days: sprint_days,
            since,
            until,
        },
        pagination: PaginationEcho { limit, offset },
    };

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(response, meta)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn dqi_is_100_for_pure_significant_feature_work() {
        // Three feat commits, all significant: functional_ratio = 1,
        // bug_rate = 0, significant_ratio = 1.
        let dqi = calc_dqi(&histogram(&[("feat", 3)]), 3, 3);
        assert_eq!(dqi, 100.0);
    }

    #[test]
    fn dqi_is_zero_without_commits() {
        assert_eq!(calc_dqi(&BTreeMap::new(), 0, 0), 0.0);
    }

    #[test]
    fn dqi_bug_rate_denominator_guard() {
        // Only docs commits: feat = fix = 0, so bug_rate contributes its
        // full 0.3 share.
        let dqi = calc_dqi(&histogram(&[("docs", 2)]), 2, 0);
        assert_eq!(dqi, 30.0);
    }

    #[test]
    fn dqi_mixed_profile() {
        // 2 feat + 2 fix of 4 total, 2 significant:
        // functional 0.5, bug_rate 0.5, significant 0.5
        // -> (0.25 + 0.15 + 0.1) * 100 = 50.0
        let dqi = calc_dqi(&histogram(&[("feat", 2), ("fix", 2)]), 4, 2);
        assert_eq!(dqi, 50.0);
    }

    #[test]
    fn dqi_rounds_to_one_decimal() {
        // 1 feat of 3 total, 1 significant:
        // (0.5/3 + 0.3 + 0.2/3) * 100 = 53.333...
        let dqi = calc_dqi(&histogram(&[("feat", 1), ("docs", 2)]), 3, 1);
        assert_eq!(dqi, 53.3);
    }

    #[test]
    fn quality_score_applies_type_multiplier_and_clamp() {
        // feat: 100 additions * weight 3.0 / 10 * 1.2 = 36
        assert_eq!(quality_score(100, "feat", 3.0), 36);
        // fix: 50 * 2.0 / 10 * 1.0 = 10
        assert_eq!(quality_score(50, "fix", 2.0), 10);
        // chore multiplier 0.8: 100 * 0.5 / 10 * 0.8 = 4
        assert_eq!(quality_score(100, "chore", 0.5), 4);
        // Clamped at 100.
        assert_eq!(quality_score(10_000, "feat", 3.0), 100);
    }

    #[test]
    fn message_truncation_takes_first_line_only() {
        assert_eq!(
            first_line_truncated("feat: add widget\n\nlong body", 120),
            "feat: add widget"
        );
        let long = "x".repeat(200);
        assert_eq!(first_line_truncated(&long, 120).chars().count(), 120);
    }

    #[test]
    fn short_sha_is_seven_chars() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456");
        assert_eq!(short_sha("abc"), "abc");
    }
}
