//! Background job status.
//!
//! - `GET /api/jobs/{job_id}`: the current `JobStatus` of an export job.

use actix_web::web::{get, scope};
use actix_web::Scope;

mod get_status;

const API_PATH: &str = "/api/jobs";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/{job_id}", get().to(get_status::process))
}
