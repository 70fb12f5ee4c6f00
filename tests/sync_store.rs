//! Store-layer integration tests against an ephemeral Postgres container.
//!
//! Skipped when no container runtime is available.

use forgepulse_api::models::VcsProvider;
use forgepulse_api::store::sessions::ProgressUpdate;
use forgepulse_api::store::{
    CommitDetailsUpdate, CommitFileStore, CommitStore, ContributorStore, NewCommitFile,
    SyncSessionStore, SyncStatus,
};
use forgepulse_api::test_support::{TestDatabase, TestDatabaseError, TestFixtures};

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping store integration test: TEST_DATABASE_URL not set");
            None
        }
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping store integration test: container runtime unavailable: {err}");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

#[tokio::test]
async fn commit_get_or_create_reports_accurate_created_flag() {
    let Some(db) = provision().await else { return };
    let pool = db.pool_clone();

    let fixtures = TestFixtures::new(&pool);
    let team_id = fixtures.insert_team("core", None).await.unwrap();
    let repo_id = fixtures
        .insert_repository(team_id, "acme", "widget")
        .await
        .unwrap();

    let commits = CommitStore::new(pool.clone());

    let mut conn = pool.acquire().await.unwrap();
    let (first_id, created) = commits
        .get_or_create(&mut conn, repo_id, "a1b2c3", "feat: widget", None)
        .await
        .unwrap();
    assert!(created);

    let (second_id, created_again) = commits
        .get_or_create(&mut conn, repo_id, "a1b2c3", "feat: widget", None)
        .await
        .unwrap();
    assert!(!created_again, "existing row must not report created=true");
    assert_eq!(first_id, second_id);

    let count = commits.count_by_repository(repo_id).await.unwrap();
    assert_eq!(count, 1, "no duplicate rows for (repository_id, sha)");
}

#[tokio::test]
async fn update_details_only_touches_provided_fields() {
    let Some(db) = provision().await else { return };
    let pool = db.pool_clone();

    let fixtures = TestFixtures::new(&pool);
    let team_id = fixtures.insert_team("core", None).await.unwrap();
    let repo_id = fixtures
        .insert_repository(team_id, "acme", "widget")
        .await
        .unwrap();

    let commits = CommitStore::new(pool.clone());
    let mut conn = pool.acquire().await.unwrap();
    let (commit_id, _) = commits
        .get_or_create(&mut conn, repo_id, "a1b2c3", "fix: crash", None)
        .await
        .unwrap();

    commits
        .update_details(
            &mut conn,
            commit_id,
            &CommitDetailsUpdate {
                additions: Some(12),
                deletions: Some(3),
                commit_type: Some("fix".to_string()),
                is_conventional: Some(true),
                ..CommitDetailsUpdate::default()
            },
        )
        .await
        .unwrap();

    // A second partial update must not clobber the earlier fields.
    commits
        .update_details(
            &mut conn,
            commit_id,
            &CommitDetailsUpdate {
                author_name: Some("Dev".to_string()),
                ..CommitDetailsUpdate::default()
            },
        )
        .await
        .unwrap();
    drop(conn);

    let stored = commits.get_by_id(commit_id).await.unwrap().unwrap();
    assert_eq!(stored.additions, Some(12));
    assert_eq!(stored.deletions, Some(3));
    assert_eq!(stored.commit_type.as_deref(), Some("fix"));
    assert_eq!(stored.is_conventional, Some(true));
    assert_eq!(stored.author_name.as_deref(), Some("Dev"));
    assert_eq!(stored.sha, "a1b2c3");
}

#[tokio::test]
async fn commit_files_bulk_insert_and_rerun_purge() {
    let Some(db) = provision().await else { return };
    let pool = db.pool_clone();

    let fixtures = TestFixtures::new(&pool);
    let team_id = fixtures.insert_team("core", None).await.unwrap();
    let repo_id = fixtures
        .insert_repository(team_id, "acme", "widget")
        .await
        .unwrap();

    let commits = CommitStore::new(pool.clone());
    let files = CommitFileStore::new(pool.clone());

    let mut conn = pool.acquire().await.unwrap();
    let (commit_id, _) = commits
        .get_or_create(&mut conn, repo_id, "a1b2c3", "feat: files", None)
        .await
        .unwrap();

    let rows = vec![
        NewCommitFile {
            file_path: "src/main.rs".to_string(),
            additions: Some(10),
            deletions: Some(2),
            changes: Some(12),
            language: Some("Rust".to_string()),
            patch: Some("@@ -1 +1 @@".to_string()),
        },
        NewCommitFile {
            file_path: "README.md".to_string(),
            additions: Some(1),
            deletions: Some(0),
            changes: Some(1),
            language: Some("Markdown".to_string()),
            patch: None,
        },
    ];

    let inserted = files.bulk_create(&mut conn, commit_id, &rows).await.unwrap();
    assert_eq!(inserted, 2);

    // Re-run path: purge and re-insert.
    let purged = files.delete_by_commit_id(&mut conn, commit_id).await.unwrap();
    assert_eq!(purged, 2);
    files.bulk_create(&mut conn, commit_id, &rows).await.unwrap();
    drop(conn);

    let stored = files.get_by_commit(commit_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].file_path, "src/main.rs");
    assert_eq!(stored[0].language.as_deref(), Some("Rust"));
}

#[tokio::test]
async fn contributor_get_or_create_is_keyed_by_provider_and_external_id() {
    let Some(db) = provision().await else { return };
    let pool = db.pool_clone();

    let contributors = ContributorStore::new(pool.clone());

    let (first, created) = contributors
        .get_or_create(VcsProvider::Github, "42", Some("octocat"), None)
        .await
        .unwrap();
    assert!(created);

    let (second, created_again) = contributors
        .get_or_create(
            VcsProvider::Github,
            "42",
            Some("octocat"),
            Some("https://github.com/octocat"),
        )
        .await
        .unwrap();
    assert!(!created_again);
    assert_eq!(first.id, second.id);

    // Profile fields refresh on repeat sightings.
    let stored = contributors
        .get_by_external_id(VcsProvider::Github, "42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.profile_url.as_deref(),
        Some("https://github.com/octocat")
    );
}

#[tokio::test]
async fn session_lifecycle_moves_strictly_forward() {
    let Some(db) = provision().await else { return };
    let pool = db.pool_clone();

    let fixtures = TestFixtures::new(&pool);
    let team_id = fixtures.insert_team("core", None).await.unwrap();
    let repo_id = fixtures
        .insert_repository(team_id, "acme", "widget")
        .await
        .unwrap();

    let sessions = SyncSessionStore::new(pool.clone());

    let session = sessions.create_session(team_id, repo_id).await.unwrap();
    assert_eq!(session.status, SyncStatus::Queued);
    assert_eq!(session.processed_commits, 0);

    sessions
        .mark_running(session.id, chrono::Utc::now())
        .await
        .unwrap();

    sessions
        .update_progress(
            session.id,
            &ProgressUpdate {
                total_commits: Some(3),
                current_phase: Some("processing_sprint".to_string()),
                ..ProgressUpdate::default()
            },
        )
        .await
        .unwrap();

    // Counter flushes are monotonic: a late write from an older snapshot
    // cannot move the row backwards.
    sessions.advance_counters(session.id, 2, 1).await.unwrap();
    sessions.advance_counters(session.id, 1, 0).await.unwrap();

    let mid = sessions.get_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(mid.status, SyncStatus::Running);
    assert_eq!(mid.total_commits, 3);
    assert_eq!(mid.processed_commits, 2);
    assert_eq!(mid.new_commits, 1);
    assert_eq!(mid.current_phase.as_deref(), Some("processing_sprint"));

    sessions
        .mark_completed(
            session.id,
            chrono::Utc::now(),
            serde_json::json!({"new_commits": 3}),
            3,
            &["b2c3d4a: upstream returned 500".to_string()],
        )
        .await
        .unwrap();

    let done = sessions.get_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(done.status, SyncStatus::Completed);
    assert_eq!(done.new_commits, 3);
    assert_eq!(done.error_list(), vec!["b2c3d4a: upstream returned 500"]);
    assert!(done.completed_at.is_some());

    // Terminal sessions no longer occupy an admission slot.
    let active = sessions.get_active_by_team(team_id).await.unwrap();
    assert!(active.is_empty());

    let last = sessions
        .last_completed_by_team(team_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.id, session.id);
}

#[tokio::test]
async fn cancellation_only_applies_to_active_sessions() {
    let Some(db) = provision().await else { return };
    let pool = db.pool_clone();

    let fixtures = TestFixtures::new(&pool);
    let team_id = fixtures.insert_team("core", None).await.unwrap();
    let repo_id = fixtures
        .insert_repository(team_id, "acme", "widget")
        .await
        .unwrap();

    let sessions = SyncSessionStore::new(pool.clone());
    let session = sessions.create_session(team_id, repo_id).await.unwrap();

    assert!(sessions.cancel(session.id).await.unwrap());
    assert!(sessions.is_cancelled(session.id).await.unwrap());

    // Already terminal: a second cancel is a no-op.
    assert!(!sessions.cancel(session.id).await.unwrap());
}
