use crate::error::AppError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const ARCHIVE_NAME: &str = "certificates.zip";

/// Archive entry name for the certificate of row `index` (zero-based).
pub fn entry_name(index: usize) -> String {
    format!("certificate-{}.pdf", index + 1)
}

/// Streams PDFs into a ZIP held in a temporary file next to its final
/// location. Nothing is visible at the destination until `persist`; a
/// builder dropped before that leaves no file behind.
pub struct ArchiveBuilder {
    zip: ZipWriter<NamedTempFile>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn create_in(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            zip: ZipWriter::new(NamedTempFile::new_in(dir)?),
            entries: 0,
        })
    }

    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), AppError> {
        self.zip.start_file(name, SimpleFileOptions::default())?;
        self.zip.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Finishes the archive and moves it to `path`, which must be in the
    /// directory the builder was created in.
    pub fn persist(self, path: &Path) -> Result<(), AppError> {
        let file = self.zip.finish()?;
        file.persist(path).map_err(|e| AppError::Io(e.error))?;
        Ok(())
    }
}
