use crate::error::AppError;
use common::model::bulk_row::BulkRow;
use std::collections::BTreeSet;
use uuid::Uuid;

/// The editable grid of a bulk session.
///
/// Never empty: it starts with one blank row and refuses to delete the last
/// one. Every row carries exactly the store's field ids as keys.
#[derive(Debug, Clone)]
pub struct RowStore {
    field_ids: BTreeSet<String>,
    rows: Vec<BulkRow>,
}

impl RowStore {
    pub fn new<I, S>(field_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field_ids = field_ids.into_iter().map(Into::into).collect();
        let mut store = Self {
            field_ids,
            rows: Vec::new(),
        };
        store.append_blank();
        store
    }

    pub fn rows(&self) -> &[BulkRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn blank_row(&self) -> BulkRow {
        let mut row = BulkRow::new(Uuid::new_v4().to_string());
        for id in &self.field_ids {
            row.values.insert(id.clone(), String::new());
        }
        row
    }

    pub fn append_blank(&mut self) -> &BulkRow {
        let row = self.blank_row();
        self.rows.push(row);
        &self.rows[self.rows.len() - 1]
    }

    /// Removes the row at `index`. Returns `false` without touching the grid
    /// when it holds a single row.
    pub fn delete(&mut self, index: usize) -> Result<bool, AppError> {
        self.check_index(index)?;
        if self.rows.len() == 1 {
            return Ok(false);
        }
        self.rows.remove(index);
        Ok(true)
    }

    pub fn set_value(
        &mut self,
        index: usize,
        field_id: &str,
        value: impl Into<String>,
    ) -> Result<(), AppError> {
        self.check_index(index)?;
        if !self.field_ids.contains(field_id) {
            return Err(AppError::InvalidEdit(format!(
                "'{field_id}' is not a field of this template"
            )));
        }
        self.rows[index]
            .values
            .insert(field_id.to_string(), value.into());
        Ok(())
    }

    pub fn set_recipient(&mut self, index: usize, email: Option<String>) -> Result<(), AppError> {
        self.check_index(index)?;
        self.rows[index].recipient_email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        Ok(())
    }

    /// Replaces the whole grid with parsed rows.
    pub fn replace_all(&mut self, rows: Vec<BulkRow>) -> Result<(), AppError> {
        if rows.is_empty() {
            return Err(AppError::Parse("no rows to load".to_string()));
        }
        if let Some(key) = rows
            .iter()
            .flat_map(|r| r.values.keys())
            .find(|k| !self.field_ids.contains(k.as_str()))
        {
            return Err(AppError::InvalidEdit(format!(
                "'{key}' is not a field of this template"
            )));
        }
        self.rows = rows;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), AppError> {
        if index >= self.rows.len() {
            return Err(AppError::InvalidEdit(format!(
                "row {index} does not exist ({} rows)",
                self.rows.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RowStore {
        RowStore::new(["name", "date"])
    }

    #[test]
    fn starts_with_one_blank_row() {
        let store = store();
        assert_eq!(store.len(), 1);
        assert_eq!(store.rows()[0].value("name"), "");
        assert_eq!(store.rows()[0].values.len(), 2);
    }

    #[test]
    fn deleting_the_last_row_is_a_no_op() {
        let mut store = store();
        let id = store.rows()[0].id.clone();
        assert!(!store.delete(0).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.rows()[0].id, id);
    }

    #[test]
    fn delete_removes_by_index() {
        let mut store = store();
        store.append_blank();
        store.set_value(1, "name", "Bob").unwrap();
        assert!(store.delete(0).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.rows()[0].value("name"), "Bob");
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut store = store();
        assert!(matches!(store.delete(3), Err(AppError::InvalidEdit(_))));
        assert!(store.set_value(1, "name", "x").is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut store = store();
        let err = store.set_value(0, "city", "Paris").unwrap_err();
        assert!(err.to_string().contains("city"));
        assert!(!store.rows()[0].values.contains_key("city"));
    }

    #[test]
    fn last_write_wins() {
        let mut store = store();
        store.set_value(0, "name", "Alice").unwrap();
        store.set_value(0, "name", "Alicia").unwrap();
        assert_eq!(store.rows()[0].value("name"), "Alicia");
    }

    #[test]
    fn recipient_is_trimmed_and_blank_cleared() {
        let mut store = store();
        store
            .set_recipient(0, Some(" a@example.com ".into()))
            .unwrap();
        assert_eq!(store.rows()[0].recipient_email.as_deref(), Some("a@example.com"));
        store.set_recipient(0, Some("  ".into())).unwrap();
        assert_eq!(store.rows()[0].recipient_email, None);
    }

    #[test]
    fn replace_all_never_installs_an_empty_grid() {
        let mut store = store();
        assert!(store.replace_all(Vec::new()).is_err());
        assert_eq!(store.len(), 1);
    }
}
