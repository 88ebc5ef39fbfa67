//! Bulk-generation sessions: opening a session on a template, loading rows
//! into its grid, editing them, and handing the grid to export or issuance.
//!
//! The provided routes are:
//! - `POST /api/bulk/sessions`: opens a session with one blank row.
//! - `GET /api/bulk/sessions/{session_id}`: the current grid.
//! - `DELETE /api/bulk/sessions/{session_id}`: closes the session.
//! - `POST /api/bulk/sessions/{session_id}/paste`: replaces the grid with
//!   pasted text.
//! - `POST /api/bulk/sessions/{session_id}/upload`: replaces the grid with an
//!   uploaded CSV or XLSX file sent as the multipart field `file`.
//! - `POST /api/bulk/sessions/{session_id}/rows`: appends a blank row.
//! - `PUT|DELETE /api/bulk/sessions/{session_id}/rows/{index}`: edits or
//!   removes one row.
//! - `POST /api/bulk/sessions/{session_id}/export`: starts an export job.
//! - `POST /api/bulk/sessions/{session_id}/issue`: issues the rows as
//!   certificates.
//!
//! Every handler answers with the session view after the change, except
//! export (a job id) and issue (the issue summary).

use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;

mod export;
mod issue;
mod paste;
mod rows;
mod session;
mod upload;

const API_PATH: &str = "/api/bulk/sessions";

/// Configures and returns the Actix scope for bulk session routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(session::create))
        .route("/{session_id}", get().to(session::get))
        .route("/{session_id}", delete().to(session::close))
        .route("/{session_id}/paste", post().to(paste::process))
        .route("/{session_id}/upload", post().to(upload::process))
        .route("/{session_id}/rows", post().to(rows::append))
        .route("/{session_id}/rows/{index}", put().to(rows::edit))
        .route("/{session_id}/rows/{index}", delete().to(rows::remove))
        .route("/{session_id}/export", post().to(export::process))
        .route("/{session_id}/issue", post().to(issue::process))
}
