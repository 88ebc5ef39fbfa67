//! Typed records at the store boundary.
//!
//! Rows come out of SQLite as loosely typed columns (an owner kind string, a
//! JSON blob of fields, a status string). They are checked and converted here
//! so nothing past the store handles an unvalidated shape.

use crate::error::AppError;
use crate::export::render::parse_hex_color;
use common::model::certificate::Certificate;
use common::model::field::Field;
use common::model::organization::{Organization, VerificationStatus};
use common::model::template::{Owner, Template};
use std::collections::{BTreeMap, HashSet};

pub(crate) struct TemplateRow {
    pub id: String,
    pub name: String,
    pub file_reference: String,
    pub is_public: i64,
    pub owner_kind: String,
    pub owner_id: String,
}

impl TryFrom<TemplateRow> for Template {
    type Error = AppError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let owner = match row.owner_kind.as_str() {
            "user" => Owner::User(row.owner_id),
            "organization" => Owner::Organization(row.owner_id),
            other => {
                return Err(AppError::MalformedRecord(format!(
                    "template '{}' has unknown owner kind '{other}'",
                    row.id
                )))
            }
        };
        let is_public = match row.is_public {
            0 => false,
            1 => true,
            other => {
                return Err(AppError::MalformedRecord(format!(
                    "template '{}' has is_public = {other}",
                    row.id
                )))
            }
        };
        if row.file_reference.trim().is_empty() {
            return Err(AppError::MalformedRecord(format!(
                "template '{}' has no file reference",
                row.id
            )));
        }
        Ok(Template {
            id: row.id,
            name: row.name,
            file_reference: row.file_reference,
            is_public,
            owner,
        })
    }
}

pub(crate) fn owner_columns(owner: &Owner) -> (&'static str, &str) {
    match owner {
        Owner::User(id) => ("user", id),
        Owner::Organization(id) => ("organization", id),
    }
}

pub(crate) struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub verification_status: String,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = AppError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        let verification_status = match row.verification_status.as_str() {
            "pending" => VerificationStatus::Pending,
            "approved" => VerificationStatus::Approved,
            "rejected" => VerificationStatus::Rejected,
            other => {
                return Err(AppError::MalformedRecord(format!(
                    "organization '{}' has unknown verification status '{other}'",
                    row.id
                )))
            }
        };
        Ok(Organization {
            id: row.id,
            name: row.name,
            verification_status,
        })
    }
}

pub(crate) struct CertificateRow {
    pub key: String,
    pub template_id: String,
    pub organization_id: Option<String>,
    pub recipient_email: String,
    pub fingerprint: String,
    pub field_values: String,
    pub artifact_path: Option<String>,
    pub issued_at: String,
    pub updated_at: Option<String>,
}

impl TryFrom<CertificateRow> for Certificate {
    type Error = AppError;

    fn try_from(row: CertificateRow) -> Result<Self, Self::Error> {
        let values: BTreeMap<String, String> =
            serde_json::from_str(&row.field_values).map_err(|e| {
                AppError::MalformedRecord(format!(
                    "certificate '{}' has invalid values: {e}",
                    row.key
                ))
            })?;
        Ok(Certificate {
            key: row.key,
            template_id: row.template_id,
            organization_id: row.organization_id,
            recipient_email: row.recipient_email,
            fingerprint: row.fingerprint,
            values,
            artifact_path: row.artifact_path,
            issued_at: row.issued_at,
            updated_at: row.updated_at,
        })
    }
}

/// Decodes and checks the stored field list of a template.
pub(crate) fn parse_fields(template_id: &str, json: &str) -> Result<Vec<Field>, AppError> {
    let fields: Vec<Field> = serde_json::from_str(json).map_err(|e| {
        AppError::MalformedRecord(format!("template '{template_id}' has invalid fields: {e}"))
    })?;
    validate_fields(&fields).map_err(|e| {
        AppError::MalformedRecord(format!("template '{template_id}' has invalid fields: {e}"))
    })?;
    Ok(fields)
}

/// Structural checks shared by stored fields and editor-supplied overrides.
pub fn validate_fields(fields: &[Field]) -> Result<(), String> {
    let mut ids = HashSet::new();
    let mut labels = HashSet::new();
    for field in fields {
        if field.id.trim().is_empty() {
            return Err("field id must not be empty".to_string());
        }
        if !ids.insert(field.id.as_str()) {
            return Err(format!("duplicate field id '{}'", field.id));
        }
        if field.label.trim().is_empty() {
            return Err(format!("field '{}' has an empty label", field.id));
        }
        if field.is_editable() && !labels.insert(field.label.trim()) {
            return Err(format!("duplicate field label '{}'", field.label.trim()));
        }
        if !(field.x.is_finite() && field.y.is_finite()) || field.x < 0.0 || field.y < 0.0 {
            return Err(format!("field '{}' has an invalid position", field.id));
        }
        if field.font_size == 0 {
            return Err(format!("field '{}' has a zero font size", field.id));
        }
        if parse_hex_color(&field.color).is_none() {
            return Err(format!(
                "field '{}' has invalid color '{}'",
                field.id, field.color
            ));
        }
    }
    Ok(())
}
