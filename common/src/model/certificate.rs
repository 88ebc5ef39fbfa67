use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An issued certificate as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub key: String,
    pub template_id: String,
    pub organization_id: Option<String>,
    pub recipient_email: String,
    pub fingerprint: String,
    pub values: BTreeMap<String, String>,
    pub artifact_path: Option<String>,
    pub issued_at: String,
    pub updated_at: Option<String>,
}

/// A batch row that matched a certificate issued earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCertificate {
    pub recipient_email: String,
    pub existing_certificate_key: String,
}

/// What an issuance batch does with rows that match an existing certificate.
/// Applies to the whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStrategy {
    /// Leave existing certificates untouched.
    #[default]
    Skip,
    /// Overwrite the existing record and regenerate its artifact.
    Update,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub issued_count: usize,
    pub duplicate_count: usize,
    pub updated_count: usize,
    pub duplicates: Vec<DuplicateCertificate>,
}
