use rocket_db_pools::sqlx::{self, FromRow, PgPool};

/// Team row as read by the sync core: identity, manager back-reference and
/// the three raw settings documents.
#[derive(Debug, Clone, FromRow)]
pub struct TeamRow {
    pub id: i32,
    pub name: String,
    pub manager_id: Option<i32>,
    pub analysis_config: Option<String>,
    pub workflow_config: Option<String>,
    pub metrics_config: Option<String>,
}

pub struct TeamStore {
    pool: PgPool,
}

impl TeamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, team_id: i32) -> Result<Option<TeamRow>, sqlx::Error> {
        sqlx::query_as::<_, TeamRow>(
            "SELECT id, name, manager_id, analysis_config, workflow_config, metrics_config
             FROM teams WHERE id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// The manager's stored forge token, if any.
    pub async fn manager_forge_token(&self, team_id: i32) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT u.forge_token
             FROM teams t
             JOIN users u ON u.id = t.manager_id
             WHERE t.id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(token,)| token))
    }

    /// Overwrite the stored settings documents that were provided; omitted
    /// documents keep their current value.
    pub async fn update_settings(
        &self,
        team_id: i32,
        analysis_config: Option<&str>,
        workflow_config: Option<&str>,
        metrics_config: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE teams SET
                analysis_config = COALESCE($2, analysis_config),
                workflow_config = COALESCE($3, workflow_config),
                metrics_config = COALESCE($4, metrics_config)
             WHERE id = $1",
        )
        .bind(team_id)
        .bind(analysis_config)
        .bind(workflow_config)
        .bind(metrics_config)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
