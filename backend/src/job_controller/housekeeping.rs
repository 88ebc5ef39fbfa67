//! Periodic cleanup of state nobody came back for: idle bulk sessions,
//! finished jobs past their retention, and the archives of those jobs.

use crate::export::archive_path;
use crate::AppState;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// What one sweep removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Swept {
    pub sessions: usize,
    pub jobs: usize,
}

/// Spawns the sweep loop. Must be called from within a Tokio runtime.
pub fn start(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&state).await;
        }
    });
}

/// Drops expired sessions and jobs, and removes the export directory of
/// every expired job.
pub async fn sweep(state: &AppState) -> Swept {
    let sessions = state
        .sessions
        .prune_idle(state.config.session_idle_timeout)
        .await;
    let jobs = state.jobs.prune_finished(state.config.job_retention).await;
    for job_id in &jobs {
        remove_export_dir(&state.config.storage_dir, job_id);
    }

    let swept = Swept {
        sessions,
        jobs: jobs.len(),
    };
    if swept == Swept::default() {
        debug!("housekeeping: nothing expired");
    } else {
        info!(
            "housekeeping: dropped {} idle sessions and {} expired jobs",
            swept.sessions, swept.jobs
        );
    }
    swept
}

fn remove_export_dir(storage_dir: &Path, job_id: &str) {
    let archive = archive_path(storage_dir, job_id);
    let Some(dir) = archive.parent().filter(|dir| dir.exists()) else {
        return;
    };
    if let Err(e) = fs::remove_dir_all(dir) {
        warn!("failed to remove expired export '{}': {e}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::sessions::BulkSession;
    use crate::config::Config;
    use crate::export::pipeline::tests::TextRenderer;
    use crate::job_controller::state::JobUpdate;
    use crate::store::Store;
    use common::jobs::JobStatus;
    use common::model::field::Field;
    use common::model::template::{Owner, Template};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn state(dir: &TempDir, idle: Duration, retention: Duration) -> AppState {
        let mut config = Config::rooted_at(dir.path());
        config.session_idle_timeout = idle;
        config.job_retention = retention;
        let store = Store::open(&config.database_path).unwrap();
        AppState::new(config, store, Arc::new(TextRenderer))
    }

    fn template() -> Template {
        Template {
            id: "tpl-1".into(),
            name: "Course".into(),
            file_reference: "templates/course.png".into(),
            is_public: false,
            owner: Owner::Organization("org-1".into()),
        }
    }

    async fn finished_job(state: &AppState, job_id: &str) {
        state.jobs.register(job_id).await;
        let archive = archive_path(&state.config.storage_dir, job_id);
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        fs::write(&archive, b"zip").unwrap();
        state
            .jobs
            .tx
            .send(JobUpdate::new(job_id, JobStatus::Completed("1 certificates ready".into())))
            .await
            .unwrap();
        for _ in 0..50 {
            if state.jobs.status(job_id).await.is_some_and(|s| s.is_terminal()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never finished");
    }

    #[tokio::test]
    async fn expired_sessions_jobs_and_archives_are_removed() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Duration::ZERO, Duration::ZERO);
        let view = state
            .sessions
            .insert(BulkSession::new(template(), &[Field::new("name", "Name")]))
            .await;
        finished_job(&state, "job-1").await;
        state.jobs.register("job-2").await;

        let swept = sweep(&state).await;
        assert_eq!(swept, Swept { sessions: 1, jobs: 1 });
        assert!(state.sessions.snapshot(&view.id).await.is_err());
        assert_eq!(state.jobs.status("job-1").await, None);
        assert!(!archive_path(&state.config.storage_dir, "job-1")
            .parent()
            .unwrap()
            .exists());
        assert_eq!(state.jobs.status("job-2").await, Some(JobStatus::Pending));
    }

    #[tokio::test]
    async fn fresh_state_survives_a_sweep() {
        let dir = TempDir::new().unwrap();
        let hour = Duration::from_secs(3600);
        let state = state(&dir, hour, hour);
        state
            .sessions
            .insert(BulkSession::new(template(), &[Field::new("name", "Name")]))
            .await;
        finished_job(&state, "job-1").await;

        assert_eq!(sweep(&state).await, Swept::default());
        assert!(archive_path(&state.config.storage_dir, "job-1").exists());
    }
}
