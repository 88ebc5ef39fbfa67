use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Actix web handler for `GET /api/jobs/{job_id}`.
///
/// # Returns
/// - `200 OK` with the job's `JobStatus`.
/// - `404 Not Found` if the job is unknown or has expired.
pub(crate) async fn process(
    job_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let job_id = job_id.into_inner();
    match state.jobs.status(&job_id).await {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => Err(AppError::not_found("Job", job_id)),
    }
}
