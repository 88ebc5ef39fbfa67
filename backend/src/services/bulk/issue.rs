//! `POST /api/bulk/sessions/{session_id}/issue`
//!
//! Issues every row of the session as a certificate on behalf of an
//! organization. Runs inline rather than as a job: the caller needs the
//! summary, including which rows were duplicates, to decide whether to send
//! the same rows again with the `update` strategy.

use crate::error::AppError;
use crate::issue::Issuer;
use crate::AppState;
use actix_web::{web, HttpResponse};
use common::requests::IssueRequest;

pub(crate) async fn process(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
    payload: web::Json<IssueRequest>,
) -> Result<HttpResponse, AppError> {
    let req = payload.into_inner();
    let session = state.sessions.snapshot(&session_id).await?;
    let organization = state.store.organization(&req.organization_id)?;

    let store = state.store.clone();
    let renderer = state.renderer.clone();
    let storage_dir = state.config.storage_dir.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let issuer = Issuer {
            store: &store,
            renderer: renderer.as_ref(),
            storage_dir: &storage_dir,
        };
        issuer.issue(
            &organization,
            &session.template,
            &session.fields,
            session.rows.rows(),
            req.strategy,
        )
    })
    .await
    .map_err(|e| AppError::Issuance(format!("Task join error: {e}")))??;

    Ok(HttpResponse::Ok().json(summary))
}
