//! Finished export archives.
//!
//! - `GET /api/export/{job_id}/download`: serves `certificates.zip` once the
//!   job is `Completed`. The archive is removed after it has been handed out,
//!   so each export can be downloaded a single time.

use actix_web::web::{get, scope};
use actix_web::Scope;

mod download;

const API_PATH: &str = "/api/export";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/{job_id}/download", get().to(download::process))
}
