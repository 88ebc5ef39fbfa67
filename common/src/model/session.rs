use crate::model::bulk_row::BulkRow;
use crate::model::field::Field;
use serde::{Deserialize, Serialize};

/// Snapshot of a bulk-generation session as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSessionView {
    pub id: String,
    pub template_id: String,
    pub fields: Vec<Field>,
    pub rows: Vec<BulkRow>,
}
