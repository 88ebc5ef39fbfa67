//! `POST /api/bulk/sessions/{session_id}/paste`
//!
//! The body is the pasted text. Its first line must name every editable
//! field; on success the grid is replaced by the parsed rows, otherwise the
//! grid is left as it was and the schema report comes back as a 400.

use crate::bulk::parser::parse_text;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use log::debug;

pub(crate) async fn process(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
    body: String,
) -> Result<HttpResponse, AppError> {
    let session = state.sessions.snapshot(&session_id).await?;
    let parsed = parse_text(&body, &session.fields)?;
    debug!("pasted {} rows into session {}", parsed.rows.len(), session.id);
    let view = state
        .sessions
        .update(&session_id, |session| session.load(parsed))
        .await?;
    Ok(HttpResponse::Ok().json(view))
}
