use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of the bulk-generation grid: a value per field id plus the
/// optional recipient the certificate is issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRow {
    pub id: String,
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
}

impl BulkRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
            recipient_email: None,
        }
    }

    /// Value for `field_id`, empty when the row has none.
    pub fn value(&self, field_id: &str) -> &str {
        self.values.get(field_id).map(String::as_str).unwrap_or("")
    }
}
