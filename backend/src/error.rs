//! Error type shared by the pipeline and the HTTP layer.
//!
//! Schema, parse and edit errors are the caller's to fix and map to 400.
//! Render, export and issuance errors abort the whole batch and map to 500.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::model::schema::SchemaReport;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Schema(SchemaReport),

    #[error("Could not read input: {0}")]
    Parse(String),

    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    #[error("Row {row} has no recipient email")]
    MissingRecipient { row: usize },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Job '{0}' has not completed")]
    JobNotReady(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Issuance failed: {0}")]
    Issuance(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(e: zip::result::ZipError) -> Self {
        AppError::Export(e.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Schema(_)
            | AppError::Parse(_)
            | AppError::InvalidEdit(_)
            | AppError::MissingRecipient { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::JobNotReady(_) => StatusCode::CONFLICT,
            AppError::Render(_)
            | AppError::Export(_)
            | AppError::Issuance(_)
            | AppError::MalformedRecord(_)
            | AppError::Database(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Schema(report) => json!({
                "error": self.to_string(),
                "missing": report.missing,
                "extra": report.extra,
                "required": report.required,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            AppError::Parse("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("Session", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden("pending".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Render("font".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_kind_and_id() {
        assert_eq!(
            AppError::not_found("Template", "t-1").to_string(),
            "Template 't-1' not found"
        );
    }
}
