//! `POST /api/bulk/sessions/{session_id}/upload`
//!
//! Expects a multipart/form-data body with a `file` part holding a CSV (or
//! other delimited text) or XLSX file. The part is buffered up to the
//! configured upload limit, parsed, and on success replaces the grid.

use crate::bulk::parser::parse_file;
use crate::error::AppError;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use log::info;

pub(crate) async fn process(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let session = state.sessions.snapshot(&session_id).await?;
    let (filename, bytes) = read_file_part(payload, state.config.max_upload_bytes).await?;
    let parsed = parse_file(&bytes, &session.fields)?;
    info!(
        "loaded {} rows from '{}' into session {}",
        parsed.rows.len(),
        filename,
        session.id
    );
    let view = state
        .sessions
        .update(&session_id, |session| session.load(parsed))
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Collects the `file` part; other parts are drained and ignored.
async fn read_file_part(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<(String, Vec<u8>), AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::Parse(e.to_string()))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::Parse(e.to_string()))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::Parse(format!(
                    "the file is larger than {max_bytes} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if name.as_deref() == Some("file") {
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                .unwrap_or_default();
            file = Some((filename, bytes));
        }
    }

    file.ok_or_else(|| AppError::Parse("missing multipart field 'file'".to_string()))
}
