//! Runtime configuration, read once from the environment at startup.
//!
//! Every key has a default; a missing key is logged and the default used, an
//! unparsable one is a startup error.

use log::{info, warn};
use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Root for template images, issued artifacts and export archives.
    pub storage_dir: PathBuf,
    /// Directory holding `<Family>-{Regular,Bold,Italic,BoldItalic}.ttf` files.
    pub fonts_dir: PathBuf,
    pub default_font: String,
    pub template_cache_ttl: Duration,
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped.
    pub session_idle_timeout: Duration,
    /// Finished jobs, and archives nobody downloaded, are kept this long.
    pub job_retention: Duration,
}

impl Config {
    pub fn load() -> Result<Self, String> {
        Ok(Self {
            host: try_load("CERTIFYHUB_HOST", "127.0.0.1")?,
            port: try_load("CERTIFYHUB_PORT", "8080")?,
            database_path: try_load("CERTIFYHUB_DATABASE", "certifyhub.sqlite")?,
            storage_dir: try_load("CERTIFYHUB_STORAGE_DIR", "./storage")?,
            fonts_dir: try_load("CERTIFYHUB_FONTS_DIR", "./fonts")?,
            default_font: try_load("CERTIFYHUB_DEFAULT_FONT", "LiberationSans")?,
            template_cache_ttl: Duration::from_secs(try_load("CERTIFYHUB_CACHE_TTL_SECS", "300")?),
            max_upload_bytes: try_load("CERTIFYHUB_MAX_UPLOAD_BYTES", "10485760")?,
            session_idle_timeout: Duration::from_secs(try_load(
                "CERTIFYHUB_SESSION_IDLE_SECS",
                "3600",
            )?),
            job_retention: Duration::from_secs(try_load("CERTIFYHUB_JOB_RETENTION_SECS", "3600")?),
        })
    }

    /// Configuration rooted in `dir`, used by tests and local tooling.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path: dir.join("certifyhub.sqlite"),
            storage_dir: dir.join("storage"),
            fonts_dir: dir.join("fonts"),
            default_font: "LiberationSans".to_string(),
            template_cache_ttl: Duration::from_secs(300),
            max_upload_bytes: 10 * 1024 * 1024,
            session_idle_timeout: Duration::from_secs(3600),
            job_retention: Duration::from_secs(3600),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, String>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        format!("Invalid {key} value '{raw}': {e}")
    })
}
