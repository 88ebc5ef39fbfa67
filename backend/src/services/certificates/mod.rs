//! Issued certificates, for recipients to share and verifiers to check.
//!
//! - `GET /api/certificates/{key}`: the certificate record.
//! - `GET /api/certificates/{key}/pdf`: its PDF artifact.

use actix_web::web::{get, scope};
use actix_web::Scope;

mod get;
mod pdf;

const API_PATH: &str = "/api/certificates";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/{key}", get().to(get::process))
        .route("/{key}/pdf", get().to(pdf::process))
}
