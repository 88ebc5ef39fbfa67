pub mod bulk_row;
pub mod certificate;
pub mod field;
pub mod organization;
pub mod schema;
pub mod session;
pub mod template;
