use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing table headers against the editable field labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub valid: bool,
    /// Field labels absent from the headers.
    pub missing: Vec<String>,
    /// Headers that match no field label. Reported, never fatal.
    pub extra: Vec<String>,
    /// Every field label, in field order.
    pub required: Vec<String>,
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return write!(f, "Headers match the template fields");
        }
        write!(f, "Missing fields: {}", self.missing.join(", "))?;
        if !self.extra.is_empty() {
            write!(f, ". Unexpected fields: {}", self.extra.join(", "))?;
        }
        write!(f, ". Required fields: {}", self.required.join(", "))
    }
}
