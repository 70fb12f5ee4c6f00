//! Durable state of sync jobs.
//!
//! A `SyncSession` records one end-to-end synchronization attempt for one
//! repository on behalf of one team. Sessions are created `queued`, move
//! strictly forward (`queued -> running -> completed|failed|cancelled`) and
//! are never reused across runs.

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, sqlx::Type, PartialEq, Eq,
)]
#[sqlx(type_name = "sync_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Failed | SyncStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Queued => "queued",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
            SyncStatus::Cancelled => "cancelled",
        }
    }
}

/// One synchronization attempt with its live progress counters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, sqlx::FromRow)]
pub struct SyncSession {
    pub id: i32,
    pub team_id: i32,
    pub repository_id: i32,
    pub status: SyncStatus,
    pub total_commits: i32,
    pub processed_commits: i32,
    pub new_commits: i32,
    pub current_phase: Option<String>,
    pub sprint_commits_done: bool,
    /// `{"errors": ["sha: message", ...]}` once any per-commit failure landed.
    pub errors: Option<JsonValue>,
    /// Opaque final result payload written at completion.
    pub result: Option<JsonValue>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncSession {
    /// Flatten the stored errors document into a plain list.
    pub fn error_list(&self) -> Vec<String> {
        self.errors
            .as_ref()
            .and_then(|doc| doc.get("errors"))
            .and_then(|list| list.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Partial progress update; omitted fields are not touched.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub total_commits: Option<i32>,
    pub processed_commits: Option<i32>,
    pub new_commits: Option<i32>,
    pub current_phase: Option<String>,
    pub sprint_commits_done: Option<bool>,
}

pub struct SyncSessionStore {
    pool: PgPool,
}

impl SyncSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a session in `queued` state.
    pub async fn create_session(
        &self,
        team_id: i32,
        repository_id: i32,
    ) -> Result<SyncSession, sqlx::Error> {
        sqlx::query_as::<_, SyncSession>(
            "INSERT INTO sync_sessions (team_id, repository_id, status)
             VALUES ($1, $2, 'queued')
             RETURNING *",
        )
        .bind(team_id)
        .bind(repository_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, session_id: i32) -> Result<Option<SyncSession>, sqlx::Error> {
        sqlx::query_as::<_, SyncSession>("SELECT * FROM sync_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Apply the provided counters/phase; anything left `None` keeps its
    /// stored value.
    pub async fn update_progress(
        &self,
        session_id: i32,
        update: &ProgressUpdate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_sessions SET
                total_commits = COALESCE($2, total_commits),
                processed_commits = COALESCE($3, processed_commits),
                new_commits = COALESCE($4, new_commits),
                current_phase = COALESCE($5, current_phase),
                sprint_commits_done = COALESCE($6, sprint_commits_done),
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(update.total_commits)
        .bind(update.processed_commits)
        .bind(update.new_commits)
        .bind(&update.current_phase)
        .bind(update.sprint_commits_done)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Monotonic counter flush used by sibling workers. `GREATEST` keeps a
    /// late write from an older snapshot from moving the row backwards.
    pub async fn advance_counters(
        &self,
        session_id: i32,
        processed_commits: i32,
        new_commits: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_sessions SET
                processed_commits = GREATEST(processed_commits, $2),
                new_commits = GREATEST(new_commits, $3),
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(processed_commits)
        .bind(new_commits)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_running(
        &self,
        session_id: i32,
        started_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_sessions
             SET status = 'running', started_at = $2, updated_at = NOW()
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(session_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_completed(
        &self,
        session_id: i32,
        completed_at: DateTime<Utc>,
        result: JsonValue,
        new_commits: i32,
        errors: &[String],
    ) -> Result<(), sqlx::Error> {
        let errors_doc = if errors.is_empty() {
            None
        } else {
            Some(serde_json::json!({ "errors": errors }))
        };

        sqlx::query(
            "UPDATE sync_sessions SET
                status = 'completed',
                completed_at = $2,
                result = $3,
                new_commits = $4,
                errors = $5,
                updated_at = NOW()
             WHERE id = $1 AND status = 'running'",
        )
        .bind(session_id)
        .bind(completed_at)
        .bind(result)
        .bind(new_commits)
        .bind(errors_doc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(
        &self,
        session_id: i32,
        completed_at: DateTime<Utc>,
        errors: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_sessions SET
                status = 'failed',
                completed_at = $2,
                errors = $3,
                updated_at = NOW()
             WHERE id = $1 AND status IN ('queued', 'running')",
        )
        .bind(session_id)
        .bind(completed_at)
        .bind(serde_json::json!({ "errors": errors }))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Request cancellation of a queued or running session. In-flight
    /// workers finish; the orchestrator observes the status at its next
    /// phase boundary.
    pub async fn cancel(&self, session_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_sessions
             SET status = 'cancelled', completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status IN ('queued', 'running')",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_cancelled(&self, session_id: i32) -> Result<bool, sqlx::Error> {
        let row: Option<(SyncStatus,)> =
            sqlx::query_as("SELECT status FROM sync_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .map(|(status,)| status == SyncStatus::Cancelled)
            .unwrap_or(false))
    }

    /// Sessions still occupying an admission slot for the team.
    pub async fn get_active_by_team(&self, team_id: i32) -> Result<Vec<SyncSession>, sqlx::Error> {
        sqlx::query_as::<_, SyncSession>(
            "SELECT * FROM sync_sessions
             WHERE team_id = $1 AND status IN ('queued', 'running')
             ORDER BY id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn last_completed_by_team(
        &self,
        team_id: i32,
    ) -> Result<Option<SyncSession>, sqlx::Error> {
        sqlx::query_as::<_, SyncSession>(
            "SELECT * FROM sync_sessions
             WHERE team_id = $1 AND status = 'completed'
             ORDER BY completed_at DESC NULLS LAST
             LIMIT 1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
    }
}
