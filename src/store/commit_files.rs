use crate::models::CommitFile;
use rocket_db_pools::sqlx::{self, PgConnection, PgPool};

/// Row payload for the bulk insert path.
#[derive(Debug, Clone)]
pub struct NewCommitFile {
    pub file_path: String,
    pub additions: Option<i32>,
    pub deletions: Option<i32>,
    pub changes: Option<i32>,
    pub language: Option<String>,
    pub patch: Option<String>,
}

pub struct CommitFileStore {
    pool: PgPool,
}

impl CommitFileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_commit(&self, commit_id: i32) -> Result<Vec<CommitFile>, sqlx::Error> {
        sqlx::query_as::<_, CommitFile>(
            "SELECT * FROM commit_files WHERE commit_id = $1 ORDER BY id",
        )
        .bind(commit_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Insert a commit's file rows in one UNNEST statement on the caller's
    /// transaction.
    pub async fn bulk_create(
        &self,
        conn: &mut PgConnection,
        commit_id: i32,
        files: &[NewCommitFile],
    ) -> Result<u64, sqlx::Error> {
        if files.is_empty() {
            return Ok(0);
        }

        let mut commit_ids = Vec::with_capacity(files.len());
        let mut paths = Vec::with_capacity(files.len());
        let mut additions = Vec::with_capacity(files.len());
        let mut deletions = Vec::with_capacity(files.len());
        let mut changes = Vec::with_capacity(files.len());
        let mut languages = Vec::with_capacity(files.len());
        let mut patches = Vec::with_capacity(files.len());

        for file in files {
            commit_ids.push(commit_id);
            paths.push(file.file_path.clone());
            additions.push(file.additions);
            deletions.push(file.deletions);
            changes.push(file.changes);
            languages.push(file.language.clone());
            patches.push(file.patch.clone());
        }

        let result = sqlx::query(
            "INSERT INTO commit_files
                (commit_id, file_path, additions, deletions, changes, language, patch)
             SELECT * FROM UNNEST($1::int[], $2::text[], $3::int[], $4::int[], $5::int[], $6::text[], $7::text[])",
        )
        .bind(&commit_ids)
        .bind(&paths)
        .bind(&additions)
        .bind(&deletions)
        .bind(&changes)
        .bind(&languages)
        .bind(&patches)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Purge a commit's file rows ahead of a re-run rewrite.
    pub async fn delete_by_commit_id(
        &self,
        conn: &mut PgConnection,
        commit_id: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM commit_files WHERE commit_id = $1")
            .bind(commit_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
