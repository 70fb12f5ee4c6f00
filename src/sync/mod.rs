//! Forge synchronization system.
//!
//! This module provides the pipeline that mirrors a team's forge activity
//! (commits, pull requests, issues, contributors) into PostgreSQL and
//! enriches every commit on the way in.
//!
//! # Architecture Overview
//!
//! - **`dispatcher`**: Entry point from the HTTP surface. Applies admission
//!   control (bounded concurrent sessions per team), resolves the forge
//!   token and team settings, creates one `SyncSession` per repository and
//!   spawns a detached orchestrator for each.
//!
//! - **`orchestrator`**: Per-session state machine. Fetches the commit list,
//!   partitions it into the recent sprint window and the older archive,
//!   drains a bounded worker pool through the shared rate limiter, runs the
//!   enrichment pipeline per commit and persists everything through the
//!   store layer while reporting live progress.
//!
//! - **`progress`**: Snapshot type emitted over the SSE channel, with
//!   change detection so clients only see real updates.
//!
//! - **`probe`**: Cheap "are there new commits upstream?" check with
//!   short-TTL in-process memoization.
//!
//! # Data Flow
//!
//! 1. **Dispatch**: `POST /team/{id}/sync` admits the request and creates
//!    queued sessions
//! 2. **List fetch**: full commit discovery via the forge client
//! 3. **Partition**: sprint window first, archive second
//! 4. **Fan-out**: per-commit detail fetches through the worker pool, each
//!    gated by the global rate limiter
//! 5. **Enrich & persist**: ignore-filter, language detection,
//!    classification, then one transaction per commit
//! 6. **Backfill**: pull requests and issues (non-fatal)
//! 7. **Finalize**: counters and result payload land on the session row
//!
//! # Error Handling
//!
//! A failed list fetch fails the session. A failed per-commit fetch or
//! enrichment appends to the session's error list and never aborts sibling
//! workers. Cancellation is observed at phase boundaries; in-flight workers
//! run to completion.

pub mod dispatcher;
pub mod orchestrator;
pub mod probe;
pub mod progress;

use rocket_db_pools::sqlx::PgPool;

pub use dispatcher::{DispatchError, DispatchOutcome, SyncDispatcher};
pub use orchestrator::{SyncOrchestrator, SyncSettingsSnapshot};
pub use probe::UpdateProbe;
pub use progress::ProgressSnapshot;

/// Run database migrations.
///
/// Idempotent: migrations that have already been applied are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("running database migrations");

    sqlx::migrate!("./migrations").run(pool).await?;

    log::info!("database migrations completed");
    Ok(())
}
