use crate::models::Issue;
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool};

/// Field set for creating an issue row.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub repository_id: i32,
    pub contributor_id: Option<i32>,
    pub external_id: Option<i64>,
    pub number: i32,
    pub title: String,
    pub state: String,
    pub author_login: Option<String>,
    pub author_avatar: Option<String>,
    pub issue_created_at: Option<DateTime<Utc>>,
    pub issue_closed_at: Option<DateTime<Utc>>,
}

pub struct IssueStore {
    pool: PgPool,
}

impl IssueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_repo_and_number(
        &self,
        repository_id: i32,
        number: i32,
    ) -> Result<Option<Issue>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            "SELECT * FROM issues WHERE repository_id = $1 AND number = $2",
        )
        .bind(repository_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_or_create(&self, new: &NewIssue) -> Result<(Issue, bool), sqlx::Error> {
        if let Some(existing) = self
            .get_by_repo_and_number(new.repository_id, new.number)
            .await?
        {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, Issue>(
            "INSERT INTO issues
                (repository_id, contributor_id, external_id, number, title, state,
                 author_login, author_avatar, issue_created_at, issue_closed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
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
        .bind(new.issue_created_at)
        .bind(new.issue_closed_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(issue) => Ok((issue, true)),
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
    ) -> Result<Vec<Issue>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            "SELECT i.* FROM issues i
             JOIN repositories r ON r.id = i.repository_id
             WHERE r.team_id = $1 AND i.issue_created_at >= $2 AND i.issue_created_at <= $3
             ORDER BY i.issue_created_at",
        )
        .bind(team_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
    }
}
