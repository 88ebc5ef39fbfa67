//! HTTP endpoints, one scope per area.

pub mod bulk;
pub mod certificates;
pub mod export;
pub mod jobs;

use actix_web::web;

/// Registers every scope on the application.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(bulk::configure_routes())
        .service(export::configure_routes())
        .service(jobs::configure_routes())
        .service(certificates::configure_routes());
}
