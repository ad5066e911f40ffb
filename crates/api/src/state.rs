use std::sync::Arc;

use storyreel_core::clip::ClipParams;
use storyreel_orchestrator::JobOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: storyreel_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Clip parameters used when a request omits them, from provider config.
    pub clip_defaults: ClipParams,
    /// The generation job orchestrator.
    pub orchestrator: Arc<JobOrchestrator>,
}
