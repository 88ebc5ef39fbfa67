use crate::error::AppError;
use crate::AppState;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use std::io::ErrorKind;

/// Actix web handler for `GET /api/certificates/{key}/pdf`.
///
/// Streams the stored PDF for inline display, named `<key>.pdf`.
///
/// # Returns
/// - `200 OK` with the PDF.
/// - `404 Not Found` if the certificate or its artifact file is missing.
pub(crate) async fn process(
    req: HttpRequest,
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let certificate = state.store.certificate(&key)?;
    let artifact = certificate
        .artifact_path
        .ok_or_else(|| AppError::not_found("Certificate artifact", certificate.key.as_str()))?;

    let file = NamedFile::open(state.config.storage_dir.join(&artifact)).map_err(|e| {
        match e.kind() {
            ErrorKind::NotFound => AppError::not_found("Certificate artifact", key.as_str()),
            _ => AppError::Io(e),
        }
    })?;
    let file = file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Inline,
        parameters: vec![DispositionParam::Filename(format!("{}.pdf", certificate.key))],
    });
    Ok(file.into_response(&req))
}
