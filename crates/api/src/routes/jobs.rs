//! Route definitions for the `/jobs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// ```text
/// GET /jobs/{job_id} -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/jobs/{job_id}", get(jobs::get_job))
}
