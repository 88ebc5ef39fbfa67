//! Registry of open bulk-generation sessions.
//!
//! A session pins the template and editable fields chosen when it was opened
//! and owns the `RowStore` the client edits. Sessions live in memory only;
//! nothing here is persisted unless an issuance commits the rows. A session
//! nobody reads or edits for the configured idle timeout is dropped by the
//! housekeeping task.

use crate::bulk::parser::ParsedRows;
use crate::bulk::row_store::RowStore;
use crate::error::AppError;
use common::model::field::{editable_fields, Field};
use common::model::session::BulkSessionView;
use common::model::template::Template;
use std::time::{Duration, Instant};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BulkSession {
    pub id: String,
    pub template: Template,
    /// Editable fields only.
    pub fields: Vec<Field>,
    pub rows: RowStore,
}

impl BulkSession {
    pub fn new(template: Template, fields: &[Field]) -> Self {
        let fields = editable_fields(fields);
        let rows = RowStore::new(fields.iter().map(|f| f.id.clone()));
        Self {
            id: Uuid::new_v4().to_string(),
            template,
            fields,
            rows,
        }
    }

    pub fn load(&mut self, parsed: ParsedRows) -> Result<(), AppError> {
        self.rows.replace_all(parsed.rows)
    }

    pub fn view(&self) -> BulkSessionView {
        BulkSessionView {
            id: self.id.clone(),
            template_id: self.template.id.clone(),
            fields: self.fields.clone(),
            rows: self.rows.rows().to_vec(),
        }
    }
}

struct SessionEntry {
    session: BulkSession,
    last_used: Instant,
}

impl SessionEntry {
    fn touch(&mut self) -> &mut BulkSession {
        self.last_used = Instant::now();
        &mut self.session
    }
}

#[derive(Clone, Default)]
pub struct SessionsState {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionsState {
    pub async fn insert(&self, session: BulkSession) -> BulkSessionView {
        let view = session.view();
        let entry = SessionEntry {
            last_used: Instant::now(),
            session,
        };
        self.sessions
            .write()
            .await
            .insert(entry.session.id.clone(), entry);
        view
    }

    /// A copy of the session, for work that must not hold the lock.
    pub async fn snapshot(&self, id: &str) -> Result<BulkSession, AppError> {
        self.sessions
            .write()
            .await
            .get_mut(id)
            .map(|entry| entry.touch().clone())
            .ok_or_else(|| AppError::not_found("Session", id))
    }

    /// Applies `edit` to the session under the write lock and returns the
    /// resulting view. A failed edit leaves the session as `edit` left it,
    /// so edits must check before they mutate.
    pub async fn update<F>(&self, id: &str, edit: F) -> Result<BulkSessionView, AppError>
    where
        F: FnOnce(&mut BulkSession) -> Result<(), AppError>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Session", id))?
            .touch();
        edit(session)?;
        Ok(session.view())
    }

    pub async fn remove(&self, id: &str) -> Option<BulkSession> {
        self.sessions.write().await.remove(id).map(|entry| entry.session)
    }

    /// Drops every session unused for at least `max_idle`. Returns how many
    /// were dropped.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used.elapsed() < max_idle);
        before - sessions.len()
    }
}
