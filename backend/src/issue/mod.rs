//! Issue mode: persisting one certificate per row instead of producing a
//! download.
//!
//! A row whose recipient already holds a certificate with the same content
//! fingerprint is a duplicate. What happens to duplicates is decided once per
//! batch by `DuplicateStrategy`: they are skipped, or their existing record is
//! overwritten and its PDF regenerated. Applying the other strategy to the
//! same rows takes a second call.
//!
//! The batch is all-or-nothing. PDFs are rendered first, each into a
//! temporary file beside its final location, with no transaction open. The
//! records are then written in one short transaction, the temporary files are
//! moved into place, and the transaction commits. A failure at any point
//! drops the temporary files and removes the artifacts already moved.

pub mod fingerprint;

use crate::error::AppError;
use crate::export::pipeline::render_row;
use crate::export::render::{CertificateRenderer, TemplateArtwork};
use crate::store::{self, NewCertificate, Store};
use common::model::bulk_row::BulkRow;
use common::model::certificate::{DuplicateCertificate, DuplicateStrategy, IssueSummary};
use common::model::field::Field;
use common::model::organization::Organization;
use common::model::template::{Owner, Template};
use fingerprint::{fingerprint, normalize_email};
use log::{debug, info, warn};
use rusqlite::TransactionBehavior;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Collaborators an issuance needs.
pub struct Issuer<'a> {
    pub store: &'a Store,
    pub renderer: &'a dyn CertificateRenderer,
    pub storage_dir: &'a Path,
}

/// Relative path of a certificate's PDF under the storage root.
pub fn artifact_path(key: &str) -> String {
    format!("certificates/{key}.pdf")
}

/// A row ready to be written: its normalized recipient, fingerprint and,
/// unless it was expected to be skipped, its rendered PDF.
struct PlannedRow<'r> {
    index: usize,
    row: &'r BulkRow,
    recipient: &'r str,
    fingerprint: String,
    rendered: Option<NamedTempFile>,
}

/// A rendered PDF waiting for its record to be written.
struct StagedArtifact {
    file: NamedTempFile,
    path: PathBuf,
    is_new: bool,
}

/// Checks that `organization` may issue from `template`.
pub fn authorize(organization: &Organization, template: &Template) -> Result<(), AppError> {
    if !organization.can_issue() {
        return Err(AppError::Forbidden(format!(
            "organization '{}' is {}; only approved organizations can issue certificates",
            organization.id,
            organization.verification_status.as_str()
        )));
    }
    let owns = matches!(&template.owner, Owner::Organization(id) if *id == organization.id);
    if !owns && !template.is_public {
        return Err(AppError::Forbidden(format!(
            "template '{}' is not available to organization '{}'",
            template.id, organization.id
        )));
    }
    Ok(())
}

impl Issuer<'_> {
    pub fn issue(
        &self,
        organization: &Organization,
        template: &Template,
        fields: &[Field],
        rows: &[BulkRow],
        strategy: DuplicateStrategy,
    ) -> Result<IssueSummary, AppError> {
        authorize(organization, template)?;

        let mut recipients = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match row.recipient_email.as_deref().map(normalize_email) {
                Some(email) if !email.is_empty() => recipients.push(email),
                _ => return Err(AppError::MissingRecipient { row: i + 1 }),
            }
        }

        let artwork = TemplateArtwork::load(&self.storage_dir.join(&template.file_reference))?;

        self.issue_rows(organization, template, fields, rows, &recipients, &artwork, strategy)
            .map_err(|e| match e {
                AppError::Database(e) => AppError::Issuance(e.to_string()),
                AppError::Io(e) => AppError::Issuance(e.to_string()),
                other => other,
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn issue_rows(
        &self,
        organization: &Organization,
        template: &Template,
        fields: &[Field],
        rows: &[BulkRow],
        recipients: &[String],
        artwork: &TemplateArtwork,
        strategy: DuplicateStrategy,
    ) -> Result<IssueSummary, AppError> {
        let certificates_dir = self.storage_dir.join("certificates");
        fs::create_dir_all(&certificates_dir)?;

        let planned =
            self.render_batch(template, fields, rows, recipients, artwork, strategy, &certificates_dir)?;

        let mut conn = self.store.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut summary = IssueSummary::default();
        let mut staged = Vec::new();

        for plan in planned {
            let (key, is_new) =
                match store::find_duplicate(&tx, &template.id, plan.recipient, &plan.fingerprint)? {
                    Some(existing) => {
                        summary.duplicate_count += 1;
                        summary.duplicates.push(DuplicateCertificate {
                            recipient_email: plan.recipient.to_string(),
                            existing_certificate_key: existing.clone(),
                        });
                        if strategy == DuplicateStrategy::Skip {
                            continue;
                        }
                        (existing, false)
                    }
                    None => (Uuid::new_v4().to_string(), true),
                };

            let file = match plan.rendered {
                Some(file) => file,
                None => self.render_to_temp(artwork, fields, plan.row, plan.index, &certificates_dir)?,
            };
            let relative = artifact_path(&key);
            let record = NewCertificate {
                key: &key,
                template_id: &template.id,
                organization_id: &organization.id,
                recipient_email: plan.recipient,
                fingerprint: &plan.fingerprint,
                values: &plan.row.values,
                artifact_path: &relative,
            };
            if is_new {
                store::insert_certificate(&tx, &record)?;
                summary.issued_count += 1;
            } else {
                store::update_certificate(&tx, &record)?;
                summary.updated_count += 1;
            }
            staged.push(StagedArtifact {
                file,
                path: self.storage_dir.join(&relative),
                is_new,
            });
        }

        let mut written = Vec::new();
        for artifact in staged {
            if let Err(e) = artifact.file.persist(&artifact.path) {
                discard(&written);
                return Err(AppError::Io(e.error));
            }
            if artifact.is_new {
                written.push(artifact.path);
            }
        }
        if let Err(e) = tx.commit() {
            discard(&written);
            return Err(e.into());
        }

        info!(
            "issued {} certificates from template '{}' ({} duplicates, {} updated)",
            summary.issued_count, template.id, summary.duplicate_count, summary.updated_count
        );
        Ok(summary)
    }

    /// Renders every row that will be written. Rows already on record, or
    /// repeated earlier in the batch, are left unrendered when they are going
    /// to be skipped.
    #[allow(clippy::too_many_arguments)]
    fn render_batch<'r>(
        &self,
        template: &Template,
        fields: &[Field],
        rows: &'r [BulkRow],
        recipients: &'r [String],
        artwork: &TemplateArtwork,
        strategy: DuplicateStrategy,
        certificates_dir: &Path,
    ) -> Result<Vec<PlannedRow<'r>>, AppError> {
        let conn = self.store.connect()?;
        let mut seen = HashSet::new();
        let mut planned = Vec::with_capacity(rows.len());

        for (index, (row, recipient)) in rows.iter().zip(recipients).enumerate() {
            let print = fingerprint(&template.id, recipient, fields, row);
            let repeated = !seen.insert((recipient.as_str(), print.clone()));
            let skipped = strategy == DuplicateStrategy::Skip
                && (repeated
                    || store::find_duplicate(&conn, &template.id, recipient, &print)?.is_some());

            let rendered = if skipped {
                debug!("row {} is a duplicate; not rendering", index + 1);
                None
            } else {
                Some(self.render_to_temp(artwork, fields, row, index, certificates_dir)?)
            };
            planned.push(PlannedRow {
                index,
                row,
                recipient,
                fingerprint: print,
                rendered,
            });
        }
        Ok(planned)
    }

    fn render_to_temp(
        &self,
        artwork: &TemplateArtwork,
        fields: &[Field],
        row: &BulkRow,
        index: usize,
        dir: &Path,
    ) -> Result<NamedTempFile, AppError> {
        let bytes = render_row(self.renderer, artwork, fields, row, index)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        Ok(file)
    }
}

/// Best-effort removal of artifacts whose records were rolled back.
fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            warn!("failed to remove orphaned artifact '{}': {e}", path.display());
        }
    }
}
