use crate::models::PullRequest;
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool};

/// Field set for creating a pull request row.
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub repository_id: i32,
    pub contributor_id: Option<i32>,
    pub external_id: Option<i64>,
    pub number: i32,
    pub title: String,
    pub state: String,
    pub author_login: Option<String>,
    pub author_avatar: Option<String>,
    pub pr_created_at: Option<DateTime<Utc>>,
    pub pr_closed_at: Option<DateTime<Utc>>,
    pub pr_merged_at: Option<DateTime<Utc>>,
}

pub struct PullRequestStore {
    pool: PgPool,
}

impl PullRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_repo_and_number(
        &self,
        repository_id: i32,
        number: i32,
    ) -> Result<Option<PullRequest>, sqlx::Error> {
        sqlx::query_as::<_, PullRequest>(
            "SELECT * FROM pull_requests WHERE repository_id = $1 AND number = $2",
        )
        .bind(repository_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
    }

    /// Create keyed by `(repository_id, number)`; existing rows are returned
    /// untouched.
    pub async fn get_or_create(
        &self,
        new: &NewPullRequest,
    ) -> Result<(PullRequest, bool), sqlx::Error> {
        if let Some(existing) = self
            .get_by_repo_and_number(new.repository_id, new.number)
            .await?
        {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, PullRequest>(
            "INSERT INTO pull_requests
                (repository_id, contributor_id, external_id, number, title, state,
                 author_login, author_avatar, pr_created_at, pr_closed_at, pr_merged_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (repository_id, number) DO NOTHING
             RETURNING *",
        )
        .bind(new.repository_id)
        .bind(new.contributor_id)
        .bind(new.external_id)
        .bind(new.number)
        .bind(&new.title)
        .bind(&new.state)
        .bind(&new.author_login)
        .bind(&new.author_avatar)
        .bind(new.pr_created_at)
        .bind(new.pr_closed_at)
        .bind(new.pr_merged_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(pr) => Ok((pr, true)),
            None => {
                let existing = self
                    .get_by_repo_and_number(new.repository_id, new.number)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, false))
            }
        }
    }

    pub async fn get_by_team_date_range(
        &self,
        team_id: i32,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<PullRequest>, sqlx::Error> {
        sqlx::query_as::<_, PullRequest>(
            "SELECT p.* FROM pull_requests p
             JOIN repositories r ON r.id = p.repository_id
             WHERE r.team_id = $1 AND p.pr_created_at >= $2 AND p.pr_created_at <= $3
             ORDER BY p.pr_created_at",
        )
        .bind(team_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
    }
}
