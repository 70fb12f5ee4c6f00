//! Synchronization endpoints: dispatch, status polling, the update probe and
//! the SSE progress stream.
//!
//! `POST /team/<id>/sync` returns session ids synchronously upon admission;
//! every outcome after that is observed through `/sync/progress/<id>` (SSE)
//! or `/sync/status/<id>` (one-shot poll).

use crate::error::ApiError;
use crate::forge::{ForgeClient, GithubClient, RateLimiter};
use crate::models::{ApiResponse, ResponseMeta};
use crate::routes::helpers::require_team;
use crate::store::{CommitStore, SyncSessionStore, TeamStore};
use crate::sync::probe::{CheckUpdatesReport, UpdateProbe};
use crate::sync::progress::ProgressSnapshot;
use crate::sync::{DispatchError, SyncDispatcher};
use chrono::{DateTime, Utc};
use rocket::State;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Repository identity echoed back by the dispatch endpoint.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RepositorySummary {
    pub id: i32,
    pub owner: String,
    pub name: String,
}

/// Payload returned synchronously when a sync is admitted.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SyncDispatchResponse {
    pub session_ids: Vec<i32>,
    pub message: String,
    pub repositories: Vec<RepositorySummary>,
}

/// One active session inside the team status payload.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ActiveSyncSession {
    pub session_id: i32,
    pub repository_id: i32,
    pub status: crate::store::SyncStatus,
    pub progress_percent: f64,
    pub current_phase: String,
    pub sprint_commits_done: bool,
    pub total_commits: i32,
    pub processed_commits: i32,
}

/// Team-level sync state.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SyncStatusResponse {
    pub has_data: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub total_commits_in_db: i64,
    pub active_sync_sessions: Vec<ActiveSyncSession>,
    pub needs_initial_sync: bool,
}

#[openapi(tag = "Sync")]
#[post("/team/<team_id>/sync")]
pub async fn dispatch_team_sync(
    team_id: i32,
    pool: &State<PgPool>,
    rate_limiter: &State<Arc<RateLimiter>>,
) -> Result<Json<ApiResponse<SyncDispatchResponse>>, ApiError> {
    let dispatcher = SyncDispatcher::new(pool.inner().clone(), rate_limiter.inner().clone());
    let outcome = dispatcher.dispatch_team(team_id).await?;

    let repositories: Vec<RepositorySummary> = outcome
        .repositories
        .iter()
        .map(|repo| RepositorySummary {
            id: repo.id,
            owner: repo.owner.clone(),
            name: repo.name.clone(),
        })
        .collect();

    let response = SyncDispatchResponse {
        message: format!(
            "Synchronization started for {} repositories",
            repositories.len()
        ),
        session_ids: outcome.session_ids,
        repositories,
    };

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(response, meta)))
}

#[openapi(tag = "Sync")]
#[get("/team/<team_id>/sync-status")]
pub async fn team_sync_status(
    team_id: i32,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<SyncStatusResponse>>, ApiError> {
    require_team(pool.inner(), team_id).await?;

    let commits = CommitStore::new(pool.inner().clone());
    let sessions = SyncSessionStore::new(pool.inner().clone());

    let total_commits = commits.count_by_team(team_id).await?;
    let active = sessions.get_active_by_team(team_id).await?;
    let last_completed = sessions.last_completed_by_team(team_id).await?;

    let active_sync_sessions: Vec<ActiveSyncSession> = active
        .iter()
        .map(|session| {
            let progress_percent = if session.total_commits > 0 {
                let raw = f64::from(session.processed_commits)
                    / f64::from(session.total_commits)
                    * 100.0;
                (raw * 100.0).round() / 100.0
            } else {
                0.0
            };

            ActiveSyncSession {
                session_id: session.id,
                repository_id: session.repository_id,
                status: session.status,
                progress_percent,
                current_phase: session
                    .current_phase
                    .clone()
                    .unwrap_or_else(|| "initializing".to_string()),
                sprint_commits_done: session.sprint_commits_done,
                total_commits: session.total_commits,
                processed_commits: session.processed_commits,
            }
        })
        .collect();

    let response = SyncStatusResponse {
        has_data: total_commits > 0,
        last_sync: last_completed.and_then(|session| session.completed_at),
        total_commits_in_db: total_commits,
        needs_initial_sync: total_commits == 0 && active.is_empty(),
        active_sync_sessions,
    };

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(response, meta)))
}

#[openapi(tag = "Sync")]
#[get("/team/<team_id>/check-updates")]
pub async fn check_team_updates(
    team_id: i32,
    pool: &State<PgPool>,
    rate_limiter: &State<Arc<RateLimiter>>,
    probe: &State<UpdateProbe>,
) -> Result<Json<ApiResponse<CheckUpdatesReport>>, ApiError> {
    require_team(pool.inner(), team_id).await?;

    let token = TeamStore::new(pool.inner().clone())
        .manager_forge_token(team_id)
        .await?;
    let forge: Arc<dyn ForgeClient> = Arc::new(
        GithubClient::new(token)
            .map_err(|_| ApiError::BadRequest("Forge token not configured".to_string()))?,
    );

    let report = probe
        .check_team_updates(pool.inner(), &forge, rate_limiter.inner(), team_id)
        .await?;

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(report, meta)))
}

#[openapi(tag = "Sync")]
#[get("/sync/status/<session_id>")]
pub async fn session_status(
    session_id: i32,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<ProgressSnapshot>>, ApiError> {
    let store = SyncSessionStore::new(pool.inner().clone());
    let session = store
        .get_by_id(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Sync session {session_id} not found")))?;

    Ok(Json(ApiResponse::new(ProgressSnapshot::from_session(
        &session,
    ))))
}

/// SSE progress channel for one session.
///
/// Polls the session row every 500 ms and emits a `data:` event only when
/// the snapshot changed. Terminal statuses produce one final
/// `event: complete` before the stream closes; a heartbeat comment goes out
/// every 30 s and the stream self-terminates after the configured timeout
/// (default 120 s), at which point clients reconnect or fall back to the
/// polling endpoint.
#[get("/sync/progress/<session_id>")]
pub async fn session_progress_stream(
    session_id: i32,
    pool: &State<PgPool>,
) -> Result<EventStream![Event + 'static], ApiError> {
    let store = SyncSessionStore::new(pool.inner().clone());
    if store.get_by_id(session_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Sync session {session_id} not found"
        )));
    }

    let timeout_secs: u64 = std::env::var("SYNC_PROGRESS_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(120);
    // 500 ms per tick.
    let max_ticks = timeout_secs * 2;

    log::info!("starting SSE stream for session {}", session_id);

    Ok(EventStream! {
        let mut last: Option<ProgressSnapshot> = None;
        let mut ticks: u64 = 0;

        loop {
            if ticks >= max_ticks {
                yield Event::json(&serde_json::json!({"error": "Stream timeout"}))
                    .event("timeout");
                log::warn!("SSE stream timeout for session {}", session_id);
                break;
            }

            match store.get_by_id(session_id).await {
                Ok(Some(session)) => {
                    let snapshot = ProgressSnapshot::from_session(&session);

                    if last.as_ref() != Some(&snapshot) {
                        yield Event::json(&snapshot);
                        last = Some(snapshot.clone());
                    }

                    if snapshot.is_terminal() {
                        yield Event::json(&snapshot).event("complete");
                        log::info!("SSE stream completed for session {}", session_id);
                        break;
                    }
                }
                Ok(None) => {
                    yield Event::json(&serde_json::json!({"error": "Session not found"}))
                        .event("error");
                    break;
                }
                Err(err) => {
                    // Transient read failure: keep the stream alive and retry
                    // on the next tick.
                    log::warn!(
                        "progress poll failed for session {}: {}",
                        session_id,
                        err
                    );
                }
            }

            if ticks > 0 && ticks % 60 == 0 {
                yield Event::comment("heartbeat");
            }

            ticks += 1;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    })
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::TeamNotFound(team_id) => {
                ApiError::NotFound(format!("Team {team_id} not found"))
            }
            DispatchError::MissingToken => ApiError::BadRequest(
                "Forge token not configured. Store a token for the team manager.".to_string(),
            ),
            DispatchError::NoRepositories => {
                ApiError::BadRequest("No repositories linked to this team".to_string())
            }
            DispatchError::TooManyActiveSessions(count) => ApiError::TooManyRequests(format!(
                "Too many active sync sessions ({count}). Please wait for current syncs to complete."
            )),
            DispatchError::Forge(err) => {
                ApiError::InternalError(format!("Forge client error: {err}"))
            }
            DispatchError::Database(err) => ApiError::from(err),
        }
    }
}
