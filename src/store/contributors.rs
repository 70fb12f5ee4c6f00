use crate::models::{Contributor, VcsProvider};
use rocket_db_pools::sqlx::{self, PgPool};

pub struct ContributorStore {
    pool: PgPool,
}

impl ContributorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, contributor_id: i32) -> Result<Option<Contributor>, sqlx::Error> {
        sqlx::query_as::<_, Contributor>("SELECT * FROM contributors WHERE id = $1")
            .bind(contributor_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_external_id(
        &self,
        provider: VcsProvider,
        external_id: &str,
    ) -> Result<Option<Contributor>, sqlx::Error> {
        sqlx::query_as::<_, Contributor>(
            "SELECT * FROM contributors WHERE vcs_provider = $1 AND external_id = $2",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_by_login(
        &self,
        login: &str,
        provider: VcsProvider,
    ) -> Result<Option<Contributor>, sqlx::Error> {
        sqlx::query_as::<_, Contributor>(
            "SELECT * FROM contributors WHERE login = $1 AND vcs_provider = $2 ORDER BY id LIMIT 1",
        )
        .bind(login)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contributors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_all(&self, limit: i64) -> Result<Vec<Contributor>, sqlx::Error> {
        sqlx::query_as::<_, Contributor>("SELECT * FROM contributors ORDER BY id LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    /// Upsert keyed by `(provider, external_id)`; profile fields are
    /// refreshed on repeat sightings, identity fields are not.
    pub async fn get_or_create(
        &self,
        provider: VcsProvider,
        external_id: &str,
        login: Option<&str>,
        profile_url: Option<&str>,
    ) -> Result<(Contributor, bool), sqlx::Error> {
        if let Some(existing) = self.get_by_external_id(provider, external_id).await? {
            if login.is_some() || profile_url.is_some() {
                sqlx::query(
                    "UPDATE contributors SET
                        login = COALESCE($2, login),
                        profile_url = COALESCE($3, profile_url)
                     WHERE id = $1",
                )
                .bind(existing.id)
                .bind(login)
                .bind(profile_url)
                .execute(&self.pool)
                .await?;
            }
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, Contributor>(
            "INSERT INTO contributors (vcs_provider, external_id, login, profile_url)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (vcs_provider, external_id) DO NOTHING
             RETURNING *",
        )
        .bind(provider)
        .bind(external_id)
        .bind(login)
        .bind(profile_url)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(contributor) => Ok((contributor, true)),
            None => {
                let existing = self
                    .get_by_external_id(provider, external_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, false))
            }
        }
    }
}
