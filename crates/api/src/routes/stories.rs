//! Route definitions for story creation, continuation, and retrieval.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::stories;
use crate::state::AppState;

/// ```text
/// POST /start                       -> start_story
/// POST /continue                    -> continue_story
/// GET  /stories/{story_id}          -> get_story
/// GET  /stories/{story_id}/latest   -> latest_completed
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(stories::start_story))
        .route("/continue", post(stories::continue_story))
        .route("/stories/{story_id}", get(stories::get_story))
        .route("/stories/{story_id}/latest", get(stories::latest_completed))
}
