use serde::{Deserialize, Serialize};

/// The identity owning a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Owner {
    User(String),
    Organization(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Template image path, relative to the storage root.
    pub file_reference: String,
    pub is_public: bool,
    pub owner: Owner,
}
