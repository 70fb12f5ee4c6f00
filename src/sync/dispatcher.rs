//! Per-team sync fan-out.
//!
//! The dispatcher is the entry point from the HTTP surface: it authorizes
//! the request shape (team exists, token available, repositories linked),
//! enforces the admission gate of at most `max_concurrent_per_team` active
//! sessions, snapshots the team's effective settings, then creates one
//! `SyncSession` per repository and spawns a detached orchestrator for each.
//! The request returns as soon as the sessions exist; outcomes are observed
//! through the progress stream and status endpoints only.

use crate::forge::{ForgeClient, ForgeError, GithubClient, RateLimiter};
use crate::models::Repository;
use crate::settings::TeamSettings;
use crate::store::{RepositoryStore, SyncSessionStore, TeamStore};
use crate::sync::orchestrator::{SyncOrchestrator, SyncSettingsSnapshot};
use rocket_db_pools::sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

/// Maximum number of queued/running sessions one team may hold.
const MAX_CONCURRENT_PER_TEAM: usize = 3;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("team {0} not found")]
    TeamNotFound(i32),
    #[error("forge token not configured")]
    MissingToken,
    #[error("no repositories linked to this team")]
    NoRepositories,
    #[error("too many active sync sessions ({0}); wait for current syncs to complete")]
    TooManyActiveSessions(usize),
    #[error("forge client error: {0}")]
    Forge(ForgeError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ForgeError> for DispatchError {
    fn from(err: ForgeError) -> Self {
        if err.is_configuration() {
            DispatchError::MissingToken
        } else {
            DispatchError::Forge(err)
        }
    }
}

/// What the sync endpoint returns synchronously upon admission.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub session_ids: Vec<i32>,
    pub repositories: Vec<Repository>,
}

pub struct SyncDispatcher {
    pool: PgPool,
    rate_limiter: Arc<RateLimiter>,
}

impl SyncDispatcher {
    pub fn new(pool: PgPool, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { pool, rate_limiter }
    }

    /// Dispatch a sync for every repository of the team.
    ///
    /// The admission gate runs before any session row is created: a rejected
    /// request leaves no trace. Sessions for one dispatch share one forge
    /// client (one token) and the process-wide rate limiter.
    pub async fn dispatch_team(&self, team_id: i32) -> Result<DispatchOutcome, DispatchError> {
        let teams = TeamStore::new(self.pool.clone());
        let team = teams
            .get_by_id(team_id)
            .await?
            .ok_or(DispatchError::TeamNotFound(team_id))?;

        let token = teams.manager_forge_token(team_id).await?;
        let forge: Arc<dyn ForgeClient> = Arc::new(GithubClient::new(token)?);

        let repositories = RepositoryStore::new(self.pool.clone())
            .get_by_team(team_id)
            .await?;
        if repositories.is_empty() {
            return Err(DispatchError::NoRepositories);
        }

        let sessions = SyncSessionStore::new(self.pool.clone());
        let active = sessions.get_active_by_team(team_id).await?;
        if active.len() >= MAX_CONCURRENT_PER_TEAM {
            return Err(DispatchError::TooManyActiveSessions(active.len()));
        }

        let settings = TeamSettings::resolve(
            team.analysis_config.as_deref(),
            team.workflow_config.as_deref(),
            team.metrics_config.as_deref(),
        );
        let snapshot = SyncSettingsSnapshot {
            analysis: settings.analysis,
            sprint_days: settings.workflow.sprint.duration_days,
            max_workers: 5,
        };

        let mut session_ids = Vec::with_capacity(repositories.len());
        for repository in &repositories {
            let session = sessions.create_session(team_id, repository.id).await?;
            session_ids.push(session.id);

            let orchestrator = SyncOrchestrator::new(
                self.pool.clone(),
                forge.clone(),
                self.rate_limiter.clone(),
                session.id,
                repository.clone(),
                snapshot.clone(),
            );

            // Detached from the request lifecycle; completion is observed
            // exclusively through the session row.
            tokio::spawn(orchestrator.run());
        }

        log::info!(
            "started sync for team {}: {} repositories, sessions {:?}",
            team_id,
            repositories.len(),
            session_ids
        );

        Ok(DispatchOutcome {
            session_ids,
            repositories,
        })
    }
}
