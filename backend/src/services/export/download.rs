use crate::error::AppError;
use crate::export::archive::ARCHIVE_NAME;
use crate::export::archive_path;
use crate::AppState;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use common::jobs::JobStatus;
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Actix web handler for `GET /api/export/{job_id}/download`.
///
/// Serves `certificates.zip` as an attachment exactly once: the file and its
/// job directory are removed as soon as it has been opened, and the job is
/// forgotten.
///
/// # Arguments
/// * `job_id` - The export job ID returned when the export started.
///
/// # Returns
/// - `200 OK` with the archive.
/// - `409 Conflict` if the job has not completed.
/// - `404 Not Found` if the job is unknown or its archive was already served.
pub(crate) async fn process(
    req: HttpRequest,
    state: web::Data<AppState>,
    job_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let job_id = job_id.into_inner();
    match state.jobs.status(&job_id).await {
        Some(JobStatus::Completed(_)) => {}
        Some(_) => return Err(AppError::JobNotReady(job_id)),
        None => return Err(AppError::not_found("Job", job_id)),
    }

    let path = archive_path(&state.config.storage_dir, &job_id);
    let file = NamedFile::open(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::not_found("Archive", job_id.as_str()),
        _ => AppError::Io(e),
    })?;
    let file = file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(ARCHIVE_NAME.to_string())],
    });

    // The open handle keeps the content readable while it streams.
    remove_archive(&path);
    state.jobs.forget(&job_id).await;
    info!("served archive of export job {job_id}");
    Ok(file.into_response(&req))
}

/// Best-effort removal of the archive and its job directory.
fn remove_archive(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("failed to remove served archive '{}': {e}", path.display());
        return;
    }
    if let Some(dir) = path.parent() {
        if let Err(e) = fs::remove_dir(dir) {
            warn!("failed to remove export directory '{}': {e}", dir.display());
        }
    }
}
