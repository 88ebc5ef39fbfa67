//! Tracks the state of long-running background jobs.
//!
//! Export jobs render every row of a bulk session outside the request/response
//! cycle; clients poll `GET /api/jobs/{job_id}` for their progress.
//!
//! The main components are:
//! - `JobsState`: a clonable, thread-safe handle on the status of all jobs. It
//!   is part of the shared `AppState`.
//! - `JobUpdate`: a message carrying a status change from a worker back to the
//!   central state.
//! - `start_job_updater`: a long-running task applying `JobUpdate` messages to
//!   the shared map.
//!
//! A job is remembered until it is downloaded or, once finished, for the
//! configured retention period.

use common::jobs::JobStatus;
use std::time::{Duration, Instant};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

/// A thread-safe, shareable container for the state of all background jobs.
#[derive(Clone)]
pub struct JobsState {
    /// A map from a job ID to its current `JobStatus`.
    ///
    /// Reads come from the status endpoint; writes come from the updater task
    /// and from `register` when a job is scheduled.
    jobs: Arc<RwLock<HashMap<String, TrackedJob>>>,

    /// Workers push their `JobUpdate`s here instead of locking `jobs`
    /// themselves.
    pub tx: mpsc::Sender<JobUpdate>,
}

#[derive(Debug)]
struct TrackedJob {
    status: JobStatus,
    /// Set when the job reaches a terminal status.
    finished_at: Option<Instant>,
}

/// A status update for a specific background job.
#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobUpdate {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
        }
    }
}

impl JobsState {
    /// Creates the shared state and spawns its updater task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel(100);
        let state = JobsState {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        let updater_state = state.clone();
        tokio::spawn(async move {
            start_job_updater(updater_state, rx).await;
        });
        state
    }

    /// Registers `job_id` as `Pending`.
    pub async fn register(&self, job_id: &str) {
        self.jobs.write().await.insert(
            job_id.to_string(),
            TrackedJob {
                status: JobStatus::Pending,
                finished_at: None,
            },
        );
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|job| job.status.clone())
    }

    /// Drops `job_id`; later status requests answer not found.
    pub async fn forget(&self, job_id: &str) {
        self.jobs.write().await.remove(job_id);
    }

    /// Drops every job that finished at least `retention` ago and returns
    /// their IDs. Pending and running jobs are never dropped.
    pub async fn prune_finished(&self, retention: Duration) -> Vec<String> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| job.finished_at.is_some_and(|at| at.elapsed() >= retention))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }
}

/// Applies every `JobUpdate` received on `rx` to the shared map.
///
/// Runs until all senders are dropped.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        // A late progress message must not overwrite a terminal status.
        if let Some(current) = jobs.get(&update.job_id) {
            if current.status.is_terminal() && !update.status.is_terminal() {
                continue;
            }
        }
        let finished_at = update.status.is_terminal().then(Instant::now);
        jobs.insert(
            update.job_id,
            TrackedJob {
                status: update.status,
                finished_at,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for(state: &JobsState, job_id: &str, expected: JobStatus) {
        for _ in 0..50 {
            if state.status(job_id).await.as_ref() == Some(&expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached {expected:?}");
    }

    #[tokio::test]
    async fn updates_flow_through_the_channel() {
        let state = JobsState::start();
        state.register("job-1").await;
        assert_eq!(state.status("job-1").await, Some(JobStatus::Pending));

        state
            .tx
            .send(JobUpdate::new("job-1", JobStatus::InProgress(50)))
            .await
            .unwrap();
        wait_for(&state, "job-1", JobStatus::InProgress(50)).await;
    }

    #[tokio::test]
    async fn progress_after_completion_is_ignored() {
        let state = JobsState::start();
        state.register("job-2").await;
        state
            .tx
            .send(JobUpdate::new("job-2", JobStatus::Completed("done".into())))
            .await
            .unwrap();
        state
            .tx
            .send(JobUpdate::new("job-2", JobStatus::InProgress(99)))
            .await
            .unwrap();
        state
            .tx
            .send(JobUpdate::new("job-3", JobStatus::Pending))
            .await
            .unwrap();
        wait_for(&state, "job-3", JobStatus::Pending).await;
        assert_eq!(
            state.status("job-2").await,
            Some(JobStatus::Completed("done".into()))
        );
    }

    #[tokio::test]
    async fn only_finished_jobs_expire() {
        let state = JobsState::start();
        state.register("running").await;
        state.register("done").await;
        state
            .tx
            .send(JobUpdate::new("done", JobStatus::Failed("boom".into())))
            .await
            .unwrap();
        wait_for(&state, "done", JobStatus::Failed("boom".into())).await;

        assert!(state.prune_finished(Duration::from_secs(3600)).await.is_empty());
        assert_eq!(state.prune_finished(Duration::ZERO).await, vec!["done".to_string()]);
        assert_eq!(state.status("done").await, None);
        assert_eq!(state.status("running").await, Some(JobStatus::Pending));
    }

    #[tokio::test]
    async fn forgotten_job_is_unknown() {
        let state = JobsState::start();
        state.register("job-4").await;
        state.forget("job-4").await;
        assert_eq!(state.status("job-4").await, None);
    }
}
