use common::model::field::Field;
use common::model::schema::SchemaReport;
use std::collections::HashSet;

/// Compares raw header cells against the labels of the editable `fields`.
///
/// Headers are trimmed and compared exactly, without case folding. The report
/// is valid iff every label is present; unexpected headers are listed in
/// `extra` but never invalidate it. Blank header cells are ignored.
pub fn validate_headers(headers: &[String], fields: &[Field]) -> SchemaReport {
    let header_set: HashSet<&str> = headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .collect();

    let required: Vec<String> = fields
        .iter()
        .filter(|f| f.is_editable())
        .map(|f| f.label.trim().to_string())
        .collect();
    let label_set: HashSet<&str> = required.iter().map(String::as_str).collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|label| !header_set.contains(label.as_str()))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let extra: Vec<String> = headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && !label_set.contains(h) && seen.insert(*h))
        .map(str::to_string)
        .collect();

    SchemaReport {
        valid: missing.is_empty(),
        missing,
        extra,
        required,
    }
}
