//! Bulk-data ingestion: header validation, tabular parsing and the editable
//! row grid held per session.

pub mod parser;
pub mod row_store;
pub mod schema;
pub mod sessions;
pub mod xlsx;
