//! The per-row loop shared by downloads and issuance.
//!
//! Rows are rendered strictly one after another. The first failing row aborts
//! the loop and nothing produced so far is kept.

use crate::error::AppError;
use crate::export::archive::{entry_name, ArchiveBuilder};
use crate::export::render::{CertificateRenderer, TemplateArtwork};
use common::model::bulk_row::BulkRow;
use common::model::field::Field;
use log::debug;
use std::path::Path;

/// The field list with each editable field's displayed value replaced by the
/// row's cell for it (empty when the row has none).
pub fn merge_row(fields: &[Field], row: &BulkRow) -> Vec<Field> {
    fields
        .iter()
        .map(|field| {
            let mut field = field.clone();
            if field.is_editable() {
                field.sample_value = row.value(&field.id).to_string();
            }
            field
        })
        .collect()
}

/// Percentage of `total` rows done after finishing row `row_index`.
pub fn progress_percent(row_index: usize, total_rows: usize) -> u32 {
    if total_rows > 0 {
        ((row_index + 1) as f32 / total_rows as f32 * 100.0) as u32
    } else {
        0
    }
}

/// Renders one row.
pub fn render_row(
    renderer: &dyn CertificateRenderer,
    artwork: &TemplateArtwork,
    fields: &[Field],
    row: &BulkRow,
    row_index: usize,
) -> Result<Vec<u8>, AppError> {
    renderer
        .render(artwork, &merge_row(fields, row))
        .map_err(|e| AppError::Render(format!("row {}: {e}", row_index + 1)))
}

/// Renders every row into a ZIP written to `destination`, calling
/// `on_progress` with the completion percentage after each row. Returns the
/// number of certificates packed.
///
/// Only one rendered PDF is held in memory at a time; the archive grows in a
/// temporary file that replaces `destination` once every row succeeded.
pub fn export_rows<F>(
    renderer: &dyn CertificateRenderer,
    artwork: &TemplateArtwork,
    fields: &[Field],
    rows: &[BulkRow],
    destination: &Path,
    mut on_progress: F,
) -> Result<usize, AppError>
where
    F: FnMut(u32),
{
    let dir = destination.parent().ok_or_else(|| {
        AppError::Export(format!("'{}' has no parent", destination.display()))
    })?;
    let mut archive = ArchiveBuilder::create_in(dir)?;
    for (i, row) in rows.iter().enumerate() {
        let pdf = render_row(renderer, artwork, fields, row, i)?;
        archive.add(&entry_name(i), &pdf)?;
        on_progress(progress_percent(i, rows.len()));
    }
    let count = archive.entries();
    archive.persist(destination)?;
    debug!("packed {count} certificates into '{}'", destination.display());
    Ok(count)
}
