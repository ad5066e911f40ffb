//! Orchestrator error type.

use storyreel_core::error::CoreError;
use storyreel_db::DbError;
use storyreel_media::{ExtractionError, MediaError};
use storyreel_provider::ProviderError;

/// Errors surfaced by orchestration operations.
///
/// Provider failures that the state machine handles internally (moderation
/// blocks, transient poll errors, fatal job failures) never appear here —
/// they become node failure codes and terminal [`crate::JobResult`]s. What
/// does surface is caller misuse ([`CoreError`]), store trouble, and
/// submission-time provider rejections.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl From<DbError> for OrchestratorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(core) => OrchestratorError::Core(core),
            DbError::Sqlx(sqlx) => OrchestratorError::Persistence(sqlx),
        }
    }
}
