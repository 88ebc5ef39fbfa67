//! Single-row grid edits. Indexes are zero-based positions in the grid.

use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use common::requests::RowEdit;

/// `POST /api/bulk/sessions/{session_id}/rows`
///
/// Appends a blank row at the end of the grid.
///
/// # Returns
/// - `200 OK` with the updated `BulkSessionView`.
/// - `404 Not Found` if the session does not exist.
pub(crate) async fn append(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let view = state
        .sessions
        .update(&session_id, |session| {
            session.rows.append_blank();
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// `PUT /api/bulk/sessions/{session_id}/rows/{index}`
///
/// Sets one cell, or the recipient email, of the row at `index`.
///
/// # Arguments
/// * `path` - The session ID and the zero-based row index.
/// * `payload` - A `RowEdit`: either `{ field_id, value }` or `{ recipient_email }`.
///
/// # Returns
/// - `200 OK` with the updated `BulkSessionView`.
/// - `400 Bad Request` if the index is out of range or the field is not editable.
/// - `404 Not Found` if the session does not exist.
pub(crate) async fn edit(
    state: web::Data<AppState>,
    path: web::Path<(String, usize)>,
    payload: web::Json<RowEdit>,
) -> Result<HttpResponse, AppError> {
    let (session_id, index) = path.into_inner();
    let view = state
        .sessions
        .update(&session_id, |session| match payload.into_inner() {
            RowEdit::Cell { field_id, value } => session.rows.set_value(index, &field_id, value),
            RowEdit::Recipient { recipient_email } => {
                session.rows.set_recipient(index, recipient_email)
            }
        })
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// `DELETE /api/bulk/sessions/{session_id}/rows/{index}`
///
/// Deleting the last remaining row is a no-op; the response still carries
/// the grid. Out-of-range indexes answer `400 Bad Request`.
pub(crate) async fn remove(
    state: web::Data<AppState>,
    path: web::Path<(String, usize)>,
) -> Result<HttpResponse, AppError> {
    let (session_id, index) = path.into_inner();
    let view = state
        .sessions
        .update(&session_id, |session| session.rows.delete(index).map(|_| ()))
        .await?;
    Ok(HttpResponse::Ok().json(view))
}
