use crate::bulk::sessions::BulkSession;
use crate::error::AppError;
use crate::store::records::validate_fields;
use crate::AppState;
use actix_web::{web, HttpResponse};
use common::model::session::BulkSessionView;
use common::requests::CreateSessionRequest;
use log::info;

/// `POST /api/bulk/sessions`
pub(crate) async fn create(
    state: web::Data<AppState>,
    payload: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, AppError> {
    let view = open_session(&state, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(view))
}

/// Opens a session on the template's stored fields, or on the fields sent by
/// the editor when it has unsaved changes.
async fn open_session(
    state: &AppState,
    req: CreateSessionRequest,
) -> Result<BulkSessionView, AppError> {
    let bundle = state.template_bundle(&req.template_id)?;
    let fields = match req.fields {
        Some(fields) => {
            validate_fields(&fields).map_err(AppError::InvalidEdit)?;
            fields
        }
        None => bundle.fields,
    };
    let view = state
        .sessions
        .insert(BulkSession::new(bundle.template, &fields))
        .await;
    info!(
        "opened bulk session {} on template '{}' with {} editable fields",
        view.id,
        view.template_id,
        view.fields.len()
    );
    Ok(view)
}

/// `GET /api/bulk/sessions/{session_id}`
pub(crate) async fn get(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session = state.sessions.snapshot(&session_id).await?;
    Ok(HttpResponse::Ok().json(session.view()))
}

/// `DELETE /api/bulk/sessions/{session_id}`
pub(crate) async fn close(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    match state.sessions.remove(&session_id).await {
        Some(_) => Ok(HttpResponse::NoContent().finish()),
        None => Err(AppError::not_found("Session", session_id.into_inner())),
    }
}
