//! SQLite backing store for templates, template metadata, organizations and
//! issued certificates.
//!
//! Each call opens its own connection on the database file; batch operations
//! take a `&Connection` so callers can run them inside one transaction.

pub mod cache;
pub mod records;

use crate::error::AppError;
use common::model::certificate::Certificate;
use common::model::field::Field;
use common::model::organization::Organization;
use common::model::template::Template;
use records::{CertificateRow, OrganizationRow, TemplateRow};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    verification_status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    file_reference TEXT NOT NULL,
    is_public INTEGER NOT NULL DEFAULT 0,
    owner_kind TEXT NOT NULL,
    owner_id TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS template_metadata (
    template_id TEXT PRIMARY KEY REFERENCES templates(id) ON DELETE CASCADE,
    fields TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS certificates (
    key TEXT PRIMARY KEY,
    template_id TEXT NOT NULL REFERENCES templates(id),
    organization_id TEXT REFERENCES organizations(id),
    recipient_email TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    field_values TEXT NOT NULL,
    artifact_path TEXT,
    issued_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS certificates_by_fingerprint
    ON certificates (template_id, recipient_email, fingerprint);
";

const CERTIFICATE_COLUMNS: &str = "key, template_id, organization_id, recipient_email, \
     fingerprint, field_values, artifact_path, issued_at, updated_at";

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Opens the database at `path`, creating missing tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.connect()?.execute_batch(SCHEMA)?;
        Ok(store)
    }

    pub fn connect(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    pub fn template(&self, template_id: &str) -> Result<Template, AppError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, name, file_reference, is_public, owner_kind, owner_id \
                 FROM templates WHERE id = ?1",
                params![template_id],
                |row| {
                    Ok(TemplateRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        file_reference: row.get(2)?,
                        is_public: row.get(3)?,
                        owner_kind: row.get(4)?,
                        owner_id: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| AppError::not_found("Template", template_id))?;
        Template::try_from(row)
    }

    /// Stored fields of a template; a template without metadata has none.
    pub fn template_fields(&self, template_id: &str) -> Result<Vec<Field>, AppError> {
        let conn = self.connect()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT fields FROM template_metadata WHERE template_id = ?1",
                params![template_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => records::parse_fields(template_id, &json),
            None => Ok(Vec::new()),
        }
    }

    pub fn organization(&self, organization_id: &str) -> Result<Organization, AppError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, name, verification_status FROM organizations WHERE id = ?1",
                params![organization_id],
                |row| {
                    Ok(OrganizationRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        verification_status: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| AppError::not_found("Organization", organization_id))?;
        Organization::try_from(row)
    }

    pub fn certificate(&self, key: &str) -> Result<Certificate, AppError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE key = ?1"),
                params![key],
                certificate_row,
            )
            .optional()?
            .ok_or_else(|| AppError::not_found("Certificate", key))?;
        Certificate::try_from(row)
    }

    /// Inserts or replaces a template and its field list. Used to seed the
    /// store; template editing happens outside this service.
    pub fn upsert_template(&self, template: &Template, fields: &[Field]) -> Result<(), AppError> {
        records::validate_fields(fields).map_err(AppError::MalformedRecord)?;
        let json = serde_json::to_string(fields)
            .map_err(|e| AppError::MalformedRecord(e.to_string()))?;
        let (owner_kind, owner_id) = records::owner_columns(&template.owner);

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO templates (id, name, file_reference, is_public, owner_kind, owner_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET name = ?2, file_reference = ?3, is_public = ?4, \
             owner_kind = ?5, owner_id = ?6",
            params![
                template.id,
                template.name,
                template.file_reference,
                template.is_public as i64,
                owner_kind,
                owner_id
            ],
        )?;
        tx.execute(
            "INSERT INTO template_metadata (template_id, fields) VALUES (?1, ?2) \
             ON CONFLICT(template_id) DO UPDATE SET fields = ?2",
            params![template.id, json],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_organization(&self, organization: &Organization) -> Result<(), AppError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO organizations (id, name, verification_status) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET name = ?2, verification_status = ?3",
            params![
                organization.id,
                organization.name,
                organization.verification_status.as_str()
            ],
        )?;
        Ok(())
    }
}

fn certificate_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CertificateRow> {
    Ok(CertificateRow {
        key: row.get(0)?,
        template_id: row.get(1)?,
        organization_id: row.get(2)?,
        recipient_email: row.get(3)?,
        fingerprint: row.get(4)?,
        field_values: row.get(5)?,
        artifact_path: row.get(6)?,
        issued_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Key of the certificate already issued for this template, recipient and
/// content fingerprint, if any.
pub fn find_duplicate(
    conn: &Connection,
    template_id: &str,
    recipient_email: &str,
    fingerprint: &str,
) -> Result<Option<String>, AppError> {
    let key = conn
        .query_row(
            "SELECT key FROM certificates \
             WHERE template_id = ?1 AND recipient_email = ?2 AND fingerprint = ?3 \
             ORDER BY issued_at LIMIT 1",
            params![template_id, recipient_email, fingerprint],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key)
}

/// Fields of a certificate written by an issuance.
pub struct NewCertificate<'a> {
    pub key: &'a str,
    pub template_id: &'a str,
    pub organization_id: &'a str,
    pub recipient_email: &'a str,
    pub fingerprint: &'a str,
    pub values: &'a BTreeMap<String, String>,
    pub artifact_path: &'a str,
}

fn encode_values(values: &BTreeMap<String, String>) -> Result<String, AppError> {
    serde_json::to_string(values).map_err(|e| AppError::Issuance(e.to_string()))
}

pub fn insert_certificate(conn: &Connection, cert: &NewCertificate<'_>) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO certificates \
         (key, template_id, organization_id, recipient_email, fingerprint, field_values, artifact_path) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            cert.key,
            cert.template_id,
            cert.organization_id,
            cert.recipient_email,
            cert.fingerprint,
            encode_values(cert.values)?,
            cert.artifact_path
        ],
    )?;
    Ok(())
}

/// Overwrites an existing certificate's content in place; its key and issue
/// date are kept.
pub fn update_certificate(conn: &Connection, cert: &NewCertificate<'_>) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE certificates SET organization_id = ?2, fingerprint = ?3, field_values = ?4, \
         artifact_path = ?5, updated_at = CURRENT_TIMESTAMP WHERE key = ?1",
        params![
            cert.key,
            cert.organization_id,
            cert.fingerprint,
            encode_values(cert.values)?,
            cert.artifact_path
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Certificate", cert.key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::organization::VerificationStatus;
    use common::model::template::Owner;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("test.sqlite")).unwrap();
        (dir, store)
    }

    fn template() -> Template {
        Template {
            id: "tpl-1".into(),
            name: "Course".into(),
            file_reference: "templates/course.png".into(),
            is_public: false,
            owner: Owner::Organization("org-1".into()),
        }
    }

    #[test]
    fn templates_round_trip_through_typed_records() {
        let (_dir, store) = store();
        let fields = vec![Field::new("name", "Name").at(100.0, 50.0)];
        store.upsert_template(&template(), &fields).unwrap();

        assert_eq!(store.template("tpl-1").unwrap(), template());
        assert_eq!(store.template_fields("tpl-1").unwrap(), fields);
    }

    #[test]
    fn missing_rows_are_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.template("nope"),
            Err(AppError::NotFound { kind: "Template", .. })
        ));
        assert!(matches!(
            store.organization("nope"),
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            store.certificate("nope"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn malformed_rows_are_rejected_at_the_boundary() {
        let (_dir, store) = store();
        let conn = store.connect().unwrap();
        conn.execute(
            "INSERT INTO templates (id, name, file_reference, is_public, owner_kind, owner_id) \
             VALUES ('bad', 'Bad', 'x.png', 0, 'robot', 'r2')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO template_metadata (template_id, fields) VALUES ('bad', 'not json')",
            [],
        )
        .unwrap();
        assert!(matches!(
            store.template("bad"),
            Err(AppError::MalformedRecord(_))
        ));
        assert!(matches!(
            store.template_fields("bad"),
            Err(AppError::MalformedRecord(_))
        ));
    }

    #[test]
    fn duplicates_are_found_by_recipient_and_fingerprint() {
        let (_dir, store) = store();
        store.upsert_template(&template(), &[]).unwrap();
        store
            .upsert_organization(&Organization {
                id: "org-1".into(),
                name: "Org".into(),
                verification_status: VerificationStatus::Approved,
            })
            .unwrap();

        let conn = store.connect().unwrap();
        let values = BTreeMap::from([("name".to_string(), "Alice".to_string())]);
        insert_certificate(
            &conn,
            &NewCertificate {
                key: "cert-1",
                template_id: "tpl-1",
                organization_id: "org-1",
                recipient_email: "alice@example.com",
                fingerprint: "abc",
                values: &values,
                artifact_path: "certificates/cert-1.pdf",
            },
        )
        .unwrap();

        assert_eq!(
            find_duplicate(&conn, "tpl-1", "alice@example.com", "abc").unwrap(),
            Some("cert-1".to_string())
        );
        assert_eq!(
            find_duplicate(&conn, "tpl-1", "alice@example.com", "other").unwrap(),
            None
        );
        assert_eq!(
            find_duplicate(&conn, "tpl-1", "bob@example.com", "abc").unwrap(),
            None
        );

        let certificate = store.certificate("cert-1").unwrap();
        assert_eq!(certificate.values, values);
        assert_eq!(certificate.updated_at, None);
    }
}
