#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Parent node {parent_id} not found in story {story_id}")]
    ParentNotFound { story_id: String, parent_id: String },

    #[error("Story {0} already has a root node")]
    DuplicateRoot(String),

    #[error("Story {0} has no completed node")]
    NoCompletedNode(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
