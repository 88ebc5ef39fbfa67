//! Rendering rows into certificates and packaging them for download.

pub mod archive;
pub mod pipeline;
pub mod render;

use std::path::{Path, PathBuf};

/// Where the archive of export job `job_id` is written.
pub fn archive_path(storage_dir: &Path, job_id: &str) -> PathBuf {
    storage_dir
        .join("exports")
        .join(job_id)
        .join(archive::ARCHIVE_NAME)
}
