//! Shared helper functions for Rocket route handlers.

use crate::error::ApiError;
use crate::store::{TeamRow, TeamStore};
use rocket_db_pools::sqlx::PgPool;

/// Load a team or fail with [`ApiError::NotFound`].
pub async fn require_team(pool: &PgPool, team_id: i32) -> Result<TeamRow, ApiError> {
    TeamStore::new(pool.clone())
        .get_by_id(team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Team {team_id} not found")))
}
