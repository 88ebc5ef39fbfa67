use common::model::bulk_row::BulkRow;
use common::model::field::Field;
use md5::Context;

const SEPARATOR: &[u8] = &[0x1f];

/// Recipient emails compare trimmed and case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Content fingerprint of a row issued from `template_id`: MD5 over the
/// template, the recipient and each editable field's value in field order.
pub fn fingerprint(template_id: &str, recipient_email: &str, fields: &[Field], row: &BulkRow) -> String {
    let mut hasher = Context::new();
    hasher.consume(template_id.as_bytes());
    hasher.consume(SEPARATOR);
    hasher.consume(normalize_email(recipient_email).as_bytes());
    for field in fields.iter().filter(|f| f.is_editable()) {
        hasher.consume(SEPARATOR);
        hasher.consume(field.id.as_bytes());
        hasher.consume(b"=");
        hasher.consume(row.value(&field.id).as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> BulkRow {
        let mut row = BulkRow::new("r");
        row.values.insert("name".into(), name.into());
        row
    }

    #[test]
    fn same_content_same_fingerprint() {
        let fields = vec![Field::new("name", "Name")];
        let a = fingerprint("tpl", "A@Example.com ", &fields, &row("Alice"));
        let b = fingerprint("tpl", "a@example.com", &fields, &row("Alice"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn content_template_and_recipient_all_matter() {
        let fields = vec![Field::new("name", "Name")];
        let base = fingerprint("tpl", "a@example.com", &fields, &row("Alice"));
        assert_ne!(base, fingerprint("tpl", "a@example.com", &fields, &row("Alicia")));
        assert_ne!(base, fingerprint("tpl-2", "a@example.com", &fields, &row("Alice")));
        assert_ne!(base, fingerprint("tpl", "b@example.com", &fields, &row("Alice")));
    }
}
