#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("id and tenant_id are required")]
    IdRequired,

    #[error("content is required")]
    ContentRequired,

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("field update conflict: {0}")]
    FieldUpdateConflict(String),

    #[error("content already exists: {0}")]
    AlreadyExists(String),
}
