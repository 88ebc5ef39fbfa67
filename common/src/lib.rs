//! Shared models for the CertifyHub bulk certificate service.
//!
//! Everything here is plain serde data: the backend owns behavior, this crate
//! only fixes the shapes exchanged over HTTP and persisted in the store.

pub mod jobs;
pub mod model;
pub mod requests;
