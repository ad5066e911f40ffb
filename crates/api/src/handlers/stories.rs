//! Handlers for story creation, continuation, and retrieval.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use storyreel_core::clip::ClipParams;
use storyreel_core::error::CoreError;
use storyreel_core::options::StoryOption;
use storyreel_core::types::Timestamp;
use storyreel_db::models::StoryNode;
use storyreel_db::repositories::NodeRepo;
use storyreel_media::MediaStore;
use storyreel_orchestrator::ContinueStory;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartStoryRequest {
    pub story_id: String,
    pub base_prompt: String,
    #[serde(default)]
    pub seconds: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContinueStoryRequest {
    pub story_id: String,
    pub parent_node_id: String,
    pub choice_label: String,
    pub provider_prompt: String,
    #[serde(default)]
    pub include_context: bool,
    #[serde(default)]
    pub seconds: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
}

/// Caller-facing view of a story node: media keys are rendered as URLs for
/// the fronting server, stored JSON options are unwrapped.
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub id: String,
    pub story_id: String,
    pub parent_id: Option<String>,
    pub choice_label: Option<String>,
    pub prompt: String,
    pub base_prompt: String,
    pub status: String,
    pub video_url: Option<String>,
    pub frame_url: Option<String>,
    pub options: Option<Vec<StoryOption>>,
    pub options_source: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub seconds: u32,
    pub size: String,
    pub model: String,
    pub created_at: Timestamp,
}

impl From<StoryNode> for NodeView {
    fn from(node: StoryNode) -> Self {
        Self {
            video_url: node.video_key.as_deref().map(MediaStore::url_for),
            frame_url: node.frame_key.as_deref().map(MediaStore::url_for),
            id: node.id,
            story_id: node.story_id,
            parent_id: node.parent_id,
            choice_label: node.choice_label,
            prompt: node.prompt,
            base_prompt: node.base_prompt,
            status: node.status,
            options: node.options.map(|json| json.0),
            options_source: node.options_source,
            error_code: node.error_code,
            error_message: node.error_message,
            seconds: node.seconds,
            size: node.size,
            model: node.model,
            created_at: node.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoryView {
    pub story_id: String,
    pub nodes: Vec<NodeView>,
}

/// Clip parameters from optional request fields, configured defaults
/// filling the gaps.
fn clip_params(defaults: &ClipParams, seconds: Option<u32>, size: Option<String>) -> ClipParams {
    let mut params = defaults.clone();
    if let Some(seconds) = seconds {
        params.seconds = seconds;
    }
    if let Some(size) = size {
        params.size = size;
    }
    params
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /start
///
/// Create a story's root node and submit its generation. Returns 202 with
/// the job and node ids; the caller polls `GET /jobs/{job_id}` from there.
pub async fn start_story(
    State(state): State<AppState>,
    Json(req): Json<StartStoryRequest>,
) -> AppResult<impl IntoResponse> {
    let params = clip_params(&state.clip_defaults, req.seconds, req.size);
    let started = state
        .orchestrator
        .start_story(&req.story_id, &req.base_prompt, params)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: started })))
}

/// POST /continue
///
/// Create a child node from a chosen option and submit its generation. The
/// parent must be a completed node of the same story.
pub async fn continue_story(
    State(state): State<AppState>,
    Json(req): Json<ContinueStoryRequest>,
) -> AppResult<impl IntoResponse> {
    let params = clip_params(&state.clip_defaults, req.seconds, req.size);
    let started = state
        .orchestrator
        .continue_story(ContinueStory {
            story_id: req.story_id,
            parent_node_id: req.parent_node_id,
            choice_label: req.choice_label,
            provider_prompt: req.provider_prompt,
            include_context: req.include_context,
            params,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: started })))
}

/// GET /stories/{story_id}
///
/// The story's full node tree in creation order.
pub async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> AppResult<Json<DataResponse<StoryView>>> {
    let nodes = NodeRepo::list_by_story(&state.pool, &story_id).await?;
    if nodes.is_empty() {
        return Err(CoreError::NotFound {
            entity: "story",
            id: story_id,
        }
        .into());
    }
    Ok(Json(DataResponse {
        data: StoryView {
            story_id,
            nodes: nodes.into_iter().map(NodeView::from).collect(),
        },
    }))
}

/// GET /stories/{story_id}/latest
///
/// The most recently created completed node of the story -- the resume
/// point for a returning viewer.
pub async fn latest_completed(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> AppResult<Json<DataResponse<NodeView>>> {
    match NodeRepo::latest_completed(&state.pool, &story_id).await? {
        Some(node) => Ok(Json(DataResponse {
            data: NodeView::from(node),
        })),
        None if NodeRepo::story_exists(&state.pool, &story_id).await? => {
            Err(CoreError::NoCompletedNode(story_id).into())
        }
        None => Err(CoreError::NotFound {
            entity: "story",
            id: story_id,
        }
        .into()),
    }
}
