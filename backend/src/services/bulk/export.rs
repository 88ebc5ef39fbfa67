//! # Export Job Start Service
//!
//! `POST /api/bulk/sessions/{session_id}/export` renders every row of a
//! session into its own PDF and packs them into `certificates.zip`.
//!
//! ## Workflow:
//!
//! 1.  **Job Scheduling**: `schedule_export_job` snapshots the session, registers
//!     a new job as `Pending` and returns its id straight away so the client can
//!     poll `GET /api/jobs/{job_id}`.
//!
//! 2.  **Background Processing**: a spawned task runs `export_blocking` through
//!     `tokio::task::spawn_blocking`, keeping image decoding and PDF generation
//!     off the async runtime.
//!
//! 3.  **Progress Reporting**: the worker sends `ExportUpdate`s after each row; a
//!     listener task forwards them to the job controller as `InProgress(percent)`.
//!
//! 4.  **Completion**: the archive grows in a temporary file inside the job's
//!     export directory and is moved into place once every row rendered, so a
//!     failed job never leaves a partial ZIP behind. The job ends `Completed`
//!     with a short message, or `Failed` with the first error.

use crate::bulk::sessions::BulkSession;
use crate::error::AppError;
use crate::export::archive_path;
use crate::export::pipeline::export_rows;
use crate::export::render::{CertificateRenderer, TemplateArtwork};
use crate::job_controller::state::JobUpdate;
use crate::AppState;
use actix_web::{web, HttpResponse};
use common::jobs::JobStatus;
use common::requests::StartJobResponse;
use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Progress sent from the blocking worker back to the async side.
#[derive(Debug)]
enum ExportUpdate {
    Job(JobStatus),
    Progress(u32),
}

pub(crate) async fn process(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let job_id = schedule_export_job(&state, &session_id).await?;
    Ok(HttpResponse::Accepted().json(StartJobResponse { job_id }))
}

async fn schedule_export_job(state: &AppState, session_id: &str) -> Result<String, AppError> {
    let session = state.sessions.snapshot(session_id).await?;
    let job_id = Uuid::new_v4().to_string();
    state.jobs.register(&job_id).await;

    let tx = state.jobs.tx.clone();
    let renderer = Arc::clone(&state.renderer);
    let storage_dir = state.config.storage_dir.clone();
    let job_id_clone = job_id.clone();

    tokio::spawn(async move {
        let (export_tx, mut export_rx) = mpsc::channel::<ExportUpdate>(100);

        let job_updater_tx = tx.clone();
        let job_id_for_updater = job_id_clone.clone();
        tokio::spawn(async move {
            while let Some(update) = export_rx.recv().await {
                let status = match update {
                    ExportUpdate::Job(status) => status,
                    ExportUpdate::Progress(percent) => JobStatus::InProgress(percent),
                };
                let _ = job_updater_tx
                    .send(JobUpdate::new(job_id_for_updater.clone(), status))
                    .await;
            }
        });

        let job_id_for_blocking = job_id_clone.clone();
        let handle = tokio::task::spawn_blocking(move || {
            export_blocking(
                export_tx,
                renderer.as_ref(),
                &storage_dir,
                &session,
                &job_id_for_blocking,
            )
        });

        let status = match handle.await {
            Ok(Ok(count)) => {
                info!("export job {job_id_clone} packed {count} certificates");
                JobStatus::Completed(format!("{count} certificates ready"))
            }
            Ok(Err(e)) => {
                error!("export job {job_id_clone} failed: {e}");
                JobStatus::Failed(e.to_string())
            }
            Err(e) => JobStatus::Failed(format!("Task join error: {e}")),
        };
        let _ = tx.send(JobUpdate::new(job_id_clone, status)).await;
    });

    Ok(job_id)
}

/// Renders the session's rows and writes the archive. Returns how many
/// certificates it holds.
fn export_blocking(
    tx: mpsc::Sender<ExportUpdate>,
    renderer: &dyn CertificateRenderer,
    storage_dir: &Path,
    session: &BulkSession,
    job_id: &str,
) -> Result<usize, AppError> {
    let _ = tx.blocking_send(ExportUpdate::Job(JobStatus::InProgress(0)));

    let destination = archive_path(storage_dir, job_id);
    let result = TemplateArtwork::load(&storage_dir.join(&session.template.file_reference))
        .and_then(|artwork| {
            export_rows(
                renderer,
                &artwork,
                &session.fields,
                session.rows.rows(),
                &destination,
                |percent| {
                    let _ = tx.blocking_send(ExportUpdate::Progress(percent));
                },
            )
        });

    if result.is_err() {
        if let Some(dir) = destination.parent().filter(|dir| dir.exists()) {
            if let Err(e) = fs::remove_dir(dir) {
                warn!("failed to remove export directory '{}': {e}", dir.display());
            }
        }
    }
    result
}
