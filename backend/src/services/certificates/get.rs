use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Actix web handler for `GET /api/certificates/{key}`.
///
/// # Arguments
/// * `key` - The certificate key returned when it was issued.
///
/// # Returns
/// - `200 OK` with the `Certificate` record as JSON.
/// - `404 Not Found` if no certificate has that key.
pub(crate) async fn process(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let certificate = state.store.certificate(&key)?;
    Ok(HttpResponse::Ok().json(certificate))
}
