//! Handlers for the `/jobs` resource.

use axum::extract::{Path, State};
use axum::Json;
use storyreel_orchestrator::JobResult;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /jobs/{job_id}
///
/// Advance the job one poll step against the provider and return its
/// externally visible status. Terminal jobs answer from the cached payload,
/// so callers may poll a finished job any number of times and always get
/// the identical result.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobResult>>> {
    let result = state.orchestrator.poll(&job_id).await?;
    Ok(Json(DataResponse { data: result }))
}
