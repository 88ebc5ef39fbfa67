//! CertifyHub bulk certificate service.
//!
//! Rows come in as pasted text or an uploaded spreadsheet, are checked
//! against the template's editable fields and held in an editable grid per
//! session. From there a session is either exported as a ZIP of PDFs by a
//! background job, or issued as persisted certificates.

pub mod bulk;
pub mod config;
pub mod error;
pub mod export;
pub mod issue;
pub mod job_controller;
pub mod services;
pub mod store;

use crate::bulk::sessions::SessionsState;
use crate::config::Config;
use crate::error::AppError;
use crate::export::render::CertificateRenderer;
use crate::job_controller::housekeeping;
use crate::job_controller::state::JobsState;
use crate::store::cache::{SystemClock, TemplateBundle, TemplateCache};
use crate::store::Store;
use common::model::field::Field;
use common::model::template::Template;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything request handlers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub templates: Arc<Mutex<TemplateCache>>,
    pub sessions: SessionsState,
    pub jobs: JobsState,
    pub renderer: Arc<dyn CertificateRenderer>,
}

impl AppState {
    /// Builds the state and starts the job updater and the housekeeping
    /// sweep; needs a Tokio runtime.
    pub fn new(config: Config, store: Store, renderer: Arc<dyn CertificateRenderer>) -> Self {
        let templates = TemplateCache::new(config.template_cache_ttl, Arc::new(SystemClock));
        let state = Self {
            config: Arc::new(config),
            store,
            templates: Arc::new(Mutex::new(templates)),
            sessions: SessionsState::default(),
            jobs: JobsState::start(),
            renderer,
        };
        housekeeping::start(state.clone());
        state
    }

    fn cache(&self) -> MutexGuard<'_, TemplateCache> {
        self.templates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The template and its stored fields, served from the cache while fresh.
    pub fn template_bundle(&self, template_id: &str) -> Result<TemplateBundle, AppError> {
        self.cache().get_or_load(template_id, || {
            Ok(TemplateBundle {
                template: self.store.template(template_id)?,
                fields: self.store.template_fields(template_id)?,
            })
        })
    }

    /// Writes a template through to the store and drops its cached copy.
    pub fn upsert_template(&self, template: &Template, fields: &[Field]) -> Result<(), AppError> {
        self.store.upsert_template(template, fields)?;
        self.cache().invalidate(&template.id);
        Ok(())
    }
}
