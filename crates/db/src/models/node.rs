//! Story node entity model and DTOs.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use storyreel_core::options::StoryOption;
use storyreel_core::status::NodeStatus;
use storyreel_core::types::Timestamp;

/// A row from the `story_nodes` table.
///
/// `prompt` is the text most recently sent to the provider (it changes when
/// a moderation retry softens it); `base_prompt` is the text the author
/// originally submitted and is what story context is built from.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoryNode {
    pub seq: i64,
    pub id: String,
    pub story_id: String,
    pub parent_id: Option<String>,
    pub choice_label: Option<String>,
    pub prompt: String,
    pub base_prompt: String,
    pub status: String,
    pub video_key: Option<String>,
    pub frame_key: Option<String>,
    pub options: Option<Json<Vec<StoryOption>>>,
    pub options_source: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub seconds: u32,
    pub size: String,
    pub model: String,
    pub created_at: Timestamp,
}

impl StoryNode {
    /// Parse the stored status string.
    ///
    /// The column only ever holds values written via [`NodeStatus::as_str`],
    /// so a parse failure means the row was edited out of band.
    pub fn node_status(&self) -> Result<NodeStatus, storyreel_core::error::CoreError> {
        NodeStatus::parse(&self.status)
    }

    /// Persisted continuation options, if any.
    pub fn stored_options(&self) -> Option<&[StoryOption]> {
        self.options.as_ref().map(|json| json.0.as_slice())
    }
}

/// Insert DTO for a new (pending) node.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub id: String,
    pub story_id: String,
    pub parent_id: Option<String>,
    pub choice_label: Option<String>,
    pub prompt: String,
    pub base_prompt: String,
    pub seconds: u32,
    pub size: String,
    pub model: String,
}
