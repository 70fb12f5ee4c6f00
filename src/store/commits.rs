use crate::models::Commit;
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;

/// Optional field set for `update_details`: only fields explicitly provided
/// overwrite stored values.
#[derive(Debug, Clone, Default)]
pub struct CommitDetailsUpdate {
    pub authored_at: Option<DateTime<Utc>>,
    pub committed_at: Option<DateTime<Utc>>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub additions: Option<i32>,
    pub deletions: Option<i32>,
    pub changes: Option<i32>,
    pub commit_type: Option<String>,
    pub is_conventional: Option<bool>,
    pub conventional_type: Option<String>,
    pub conventional_scope: Option<String>,
    pub is_breaking_change: Option<bool>,
    pub is_merge_commit: Option<bool>,
    pub is_pr_commit: Option<bool>,
    pub is_revert_commit: Option<bool>,
    pub parents_count: Option<i32>,
    pub files_changed: Option<i32>,
}

pub struct CommitStore {
    pool: PgPool,
}

impl CommitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, commit_id: i32) -> Result<Option<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>("SELECT * FROM commits WHERE id = $1")
            .bind(commit_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_sha(&self, sha: &str) -> Result<Option<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>("SELECT * FROM commits WHERE sha = $1 ORDER BY id LIMIT 1")
            .bind(sha)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_repo_and_sha(
        &self,
        repository_id: i32,
        sha: &str,
    ) -> Result<Option<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>(
            "SELECT * FROM commits WHERE repository_id = $1 AND sha = $2",
        )
        .bind(repository_id)
        .bind(sha)
        .fetch_optional(&self.pool)
        .await
    }

    /// All SHAs already persisted for a repository; used to skip known
    /// commits before fanning out detail fetches.
    pub async fn existing_shas(&self, repository_id: i32) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT sha FROM commits WHERE repository_id = $1")
                .bind(repository_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(sha,)| sha).collect())
    }

    /// Create the base commit row if it does not exist yet. The `created`
    /// flag reflects the actual outcome even when racing a sibling worker.
    pub async fn get_or_create(
        &self,
        conn: &mut PgConnection,
        repository_id: i32,
        sha: &str,
        message: &str,
        contributor_id: Option<i32>,
    ) -> Result<(i32, bool), sqlx::Error> {
        let existing: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM commits WHERE repository_id = $1 AND sha = $2")
                .bind(repository_id)
                .bind(sha)
                .fetch_optional(&mut *conn)
                .await?;

        if let Some((id,)) = existing {
            return Ok((id, false));
        }

        let inserted: Option<(i32,)> = sqlx::query_as(
            "INSERT INTO commits (repository_id, contributor_id, sha, message)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (repository_id, sha) DO NOTHING
             RETURNING id",
        )
        .bind(repository_id)
        .bind(contributor_id)
        .bind(sha)
        .bind(message)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some((id,)) => Ok((id, true)),
            None => {
                let (id,): (i32,) =
                    sqlx::query_as("SELECT id FROM commits WHERE repository_id = $1 AND sha = $2")
                        .bind(repository_id)
                        .bind(sha)
                        .fetch_one(&mut *conn)
                        .await?;
                Ok((id, false))
            }
        }
    }

    /// Partial update of timestamps, author fields, counters and the
    /// enrichment block. Fields left `None` are untouched; SHA and message
    /// are immutable here.
    pub async fn update_details(
        &self,
        conn: &mut PgConnection,
        commit_id: i32,
        update: &CommitDetailsUpdate,
    ) -> Result<(), sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE commits SET updated_at = NOW()");

        if let Some(v) = update.authored_at {
            qb.push(", authored_at = ").push_bind(v);
        }
        if let Some(v) = update.committed_at {
            qb.push(", committed_at = ").push_bind(v);
        }
        if let Some(v) = &update.author_name {
            qb.push(", author_name = ").push_bind(v.clone());
        }
        if let Some(v) = &update.author_email {
            qb.push(", author_email = ").push_bind(v.clone());
        }
        if let Some(v) = update.additions {
            qb.push(", additions = ").push_bind(v);
        }
        if let Some(v) = update.deletions {
            qb.push(", deletions = ").push_bind(v);
        }
        if let Some(v) = update.changes {
            qb.push(", changes = ").push_bind(v);
        }
        if let Some(v) = &update.commit_type {
            qb.push(", commit_type = ").push_bind(v.clone());
        }
        if let Some(v) = update.is_conventional {
            qb.push(", is_conventional = ").push_bind(v);
        }
        if let Some(v) = &update.conventional_type {
            qb.push(", conventional_type = ").push_bind(v.clone());
        }
        if let Some(v) = &update.conventional_scope {
            qb.push(", conventional_scope = ").push_bind(v.clone());
        }
        if let Some(v) = update.is_breaking_change {
            qb.push(", is_breaking_change = ").push_bind(v);
        }
        if let Some(v) = update.is_merge_commit {
            qb.push(", is_merge_commit = ").push_bind(v);
        }
        if let Some(v) = update.is_pr_commit {
            qb.push(", is_pr_commit = ").push_bind(v);
        }
        if let Some(v) = update.is_revert_commit {
            qb.push(", is_revert_commit = ").push_bind(v);
        }
        if let Some(v) = update.parents_count {
            qb.push(", parents_count = ").push_bind(v);
        }
        if let Some(v) = update.files_changed {
            qb.push(", files_changed = ").push_bind(v);
        }

        qb.push(" WHERE id = ").push_bind(commit_id);
        qb.build().execute(&mut *conn).await?;

        Ok(())
    }

    pub async fn get_by_repository(
        &self,
        repository_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>(
            "SELECT * FROM commits
             WHERE repository_id = $1
             ORDER BY authored_at DESC NULLS LAST
             LIMIT $2 OFFSET $3",
        )
        .bind(repository_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Commits for all of a team's repositories inside a time window,
    /// joined via the repository link.
    pub async fn get_by_team_date_range(
        &self,
        team_id: i32,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>(
            "SELECT c.* FROM commits c
             JOIN repositories r ON r.id = c.repository_id
             WHERE r.team_id = $1 AND c.authored_at >= $2 AND c.authored_at <= $3
             ORDER BY c.authored_at",
        )
        .bind(team_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_by_contributor_and_team(
        &self,
        contributor_id: i32,
        team_id: i32,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>(
            "SELECT c.* FROM commits c
             JOIN repositories r ON r.id = c.repository_id
             WHERE c.contributor_id = $1 AND r.team_id = $2
               AND c.authored_at >= $3 AND c.authored_at <= $4
             ORDER BY c.authored_at DESC
             LIMIT $5 OFFSET $6",
        )
        .bind(contributor_id)
        .bind(team_id)
        .bind(since)
        .bind(until)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn exists(&self, repository_id: i32, sha: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM commits WHERE repository_id = $1 AND sha = $2")
                .bind(repository_id)
                .bind(sha)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Delete a commit; its file rows go with it (cascade).
    pub async fn delete(&self, commit_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM commits WHERE id = $1")
            .bind(commit_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_repository(&self, repository_id: i32) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM commits WHERE repository_id = $1")
                .bind(repository_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn count_by_team(&self, team_id: i32) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM commits c
             JOIN repositories r ON r.id = c.repository_id
             WHERE r.team_id = $1",
        )
        .bind(team_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
