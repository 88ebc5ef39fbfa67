use crate::model::certificate::DuplicateStrategy;
use crate::model::field::Field;
use serde::{Deserialize, Serialize};

/// Request payload for opening a bulk-generation session.
/// `fields` overrides the template's stored fields with the editor's state.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub template_id: String,
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
}

/// A single edit on one grid row.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowEdit {
    Cell { field_id: String, value: String },
    Recipient { recipient_email: Option<String> },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueRequest {
    pub organization_id: String,
    #[serde(default)]
    pub strategy: DuplicateStrategy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: String,
}
