//! Progress snapshots emitted over the SSE channel.

use crate::store::{SyncSession, SyncStatus};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Point-in-time view of a sync session, shaped for clients. Snapshots are
/// compared for equality so the stream only emits on change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressSnapshot {
    pub session_id: i32,
    pub status: SyncStatus,
    pub total_commits: i32,
    pub processed_commits: i32,
    pub new_commits: i32,
    /// `floor(100 * processed / total)`, 0 when nothing was discovered.
    pub progress_percent: i32,
    pub current_phase: String,
    pub sprint_commits_done: bool,
    pub errors: Vec<String>,
}

impl ProgressSnapshot {
    pub fn from_session(session: &SyncSession) -> Self {
        let progress_percent = if session.total_commits > 0 {
            ((i64::from(session.processed_commits) * 100) / i64::from(session.total_commits)) as i32
        } else {
            0
        };

        Self {
            session_id: session.id,
            status: session.status,
            total_commits: session.total_commits,
            processed_commits: session.processed_commits,
            new_commits: session.new_commits,
            progress_percent,
            current_phase: session
                .current_phase
                .clone()
                .unwrap_or_else(|| "initializing".to_string()),
            sprint_commits_done: session.sprint_commits_done,
            errors: session.error_list(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total: i32, processed: i32, status: SyncStatus) -> SyncSession {
        SyncSession {
            id: 7,
            team_id: 1,
            repository_id: 2,
            status,
            total_commits: total,
            processed_commits: processed,
            new_commits: 0,
            current_phase: Some("processing_sprint".to_string()),
            sprint_commits_done: false,
            errors: None,
            result: None,
            started_at: None,
            completed_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn percent_is_floor_of_ratio() {
        let snapshot = ProgressSnapshot::from_session(&session(3, 1, SyncStatus::Running));
        assert_eq!(snapshot.progress_percent, 33);

        let snapshot = ProgressSnapshot::from_session(&session(3, 3, SyncStatus::Running));
        assert_eq!(snapshot.progress_percent, 100);
    }

    #[test]
    fn percent_is_zero_when_total_unknown() {
        let snapshot = ProgressSnapshot::from_session(&session(0, 0, SyncStatus::Queued));
        assert_eq!(snapshot.progress_percent, 0);
    }

    #[test]
    fn change_detection_via_equality() {
        let a = ProgressSnapshot::from_session(&session(10, 4, SyncStatus::Running));
        let b = ProgressSnapshot::from_session(&session(10, 4, SyncStatus::Running));
        let c = ProgressSnapshot::from_session(&session(10, 5, SyncStatus::Running));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn errors_flatten_from_session_document() {
        let mut s = session(1, 1, SyncStatus::Completed);
        s.errors = Some(serde_json::json!({ "errors": ["abc1234: timeout"] }));

        let snapshot = ProgressSnapshot::from_session(&s);
        assert_eq!(snapshot.errors, vec!["abc1234: timeout".to_string()]);
        assert!(snapshot.is_terminal());
    }
}
