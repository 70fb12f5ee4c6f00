//! Cheap "are there new commits upstream?" probe.
//!
//! Compares the per-repository commit count in the database with the forge's
//! count (Link-header probe). Whole-team results are memoized in-process for
//! five minutes; per-repository forge errors populate an `error` field
//! instead of failing the whole check.

use crate::forge::{ForgeClient, RateLimiter};
use crate::store::{CommitStore, RepositoryStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Upstream-vs-local state of one repository.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepositoryUpdateInfo {
    pub id: i32,
    pub owner: String,
    pub name: String,
    pub commits_in_db: i64,
    /// Count reported by the forge, absent when the probe failed.
    pub commits_in_forge: Option<i64>,
    pub has_new_commits: bool,
    pub new_commits_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Team-level probe result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckUpdatesReport {
    pub repositories: Vec<RepositoryUpdateInfo>,
    pub total_new_commits: i64,
    pub checked_at: DateTime<Utc>,
}

struct CacheEntry {
    computed_at: Instant,
    report: CheckUpdatesReport,
}

/// Process-local probe cache keyed by team id. Cross-replica invalidation is
/// out of scope.
#[derive(Default)]
pub struct UpdateProbe {
    cache: DashMap<i32, CacheEntry>,
}

impl UpdateProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe every repository of the team, serving a cached report when one
    /// is fresh enough.
    pub async fn check_team_updates(
        &self,
        pool: &PgPool,
        forge: &Arc<dyn ForgeClient>,
        rate_limiter: &RateLimiter,
        team_id: i32,
    ) -> Result<CheckUpdatesReport, sqlx::Error> {
        if let Some(entry) = self.cache.get(&team_id) {
            if entry.computed_at.elapsed() < CACHE_TTL {
                log::debug!("returning cached check-updates for team {}", team_id);
                return Ok(entry.report.clone());
            }
        }

        let repositories = RepositoryStore::new(pool.clone()).get_by_team(team_id).await?;
        let commits = CommitStore::new(pool.clone());

        let mut infos = Vec::with_capacity(repositories.len());
        let mut total_new = 0;

        for repo in repositories {
            let db_count = commits.count_by_repository(repo.id).await?;

            rate_limiter.acquire(1).await;
            let (forge_count, error) = match forge.count_commits(&repo.owner, &repo.name).await {
                Ok(count) => (Some(count as i64), None),
                Err(err) => {
                    log::warn!(
                        "failed to check updates for {}/{}: {}",
                        repo.owner,
                        repo.name,
                        err
                    );
                    (None, Some(err.to_string()))
                }
            };

            let new_count = forge_count
                .map(|remote| (remote - db_count).max(0))
                .unwrap_or(0);
            total_new += new_count;

            infos.push(RepositoryUpdateInfo {
                id: repo.id,
                owner: repo.owner,
                name: repo.name,
                commits_in_db: db_count,
                commits_in_forge: forge_count,
                has_new_commits: new_count > 0,
                new_commits_count: new_count,
                error,
            });
        }

        let report = CheckUpdatesReport {
            repositories: infos,
            total_new_commits: total_new,
            checked_at: Utc::now(),
        };

        self.cache.insert(
            team_id,
            CacheEntry {
                computed_at: Instant::now(),
                report: report.clone(),
            },
        );

        Ok(report)
    }
}
