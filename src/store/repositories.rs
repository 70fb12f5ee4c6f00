use crate::models::Repository;
use rocket_db_pools::sqlx::{self, PgPool};

/// Read-only view over repository rows. Repositories are created and linked
/// to teams by the collaborator CRUD surface; the sync core only resolves
/// them by id or team.
pub struct RepositoryStore {
    pool: PgPool,
}

impl RepositoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, repo_id: i32) -> Result<Option<Repository>, sqlx::Error> {
        sqlx::query_as::<_, Repository>("SELECT * FROM repositories WHERE id = $1")
            .bind(repo_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_team(&self, team_id: i32) -> Result<Vec<Repository>, sqlx::Error> {
        sqlx::query_as::<_, Repository>(
            "SELECT * FROM repositories WHERE team_id = $1 ORDER BY id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }
}
