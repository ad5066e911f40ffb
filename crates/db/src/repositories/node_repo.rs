//! Repository for the `story_nodes` table.
//!
//! Status changes go through [`storyreel_core::status::validate_transition`]
//! inside a transaction, so an illegal transition (e.g. completed -> failed)
//! can never be written, regardless of caller interleaving.

use sqlx::types::Json;
use sqlx::Sqlite;

use storyreel_core::error::CoreError;
use storyreel_core::options::StoryOption;
use storyreel_core::status::{self, NodeStatus, OptionsSource};
use storyreel_core::types::Timestamp;

use crate::models::node::{NewNode, StoryNode};
use crate::{DbError, DbPool};

/// Column list for `story_nodes` queries.
const COLUMNS: &str = "\
    seq, id, story_id, parent_id, choice_label, prompt, base_prompt, \
    status, video_key, frame_key, options, options_source, \
    error_code, error_message, seconds, size, model, created_at";

/// Provides CRUD operations for story nodes.
pub struct NodeRepo;

impl NodeRepo {
    /// Insert the root node of a story. Fails if the story already has one.
    pub async fn create_root(pool: &DbPool, input: &NewNode) -> Result<StoryNode, DbError> {
        if input.parent_id.is_some() {
            return Err(CoreError::Validation("root node must not have a parent".into()).into());
        }

        let mut tx = pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM story_nodes WHERE story_id = $1 AND parent_id IS NULL")
                .bind(&input.story_id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(CoreError::DuplicateRoot(input.story_id.clone()).into());
        }

        let node = Self::insert(&mut tx, input).await?;
        tx.commit().await?;
        Ok(node)
    }

    /// Insert a child node. The parent must exist and belong to the same story.
    pub async fn create_child(pool: &DbPool, input: &NewNode) -> Result<StoryNode, DbError> {
        let parent_id = input
            .parent_id
            .as_deref()
            .ok_or_else(|| CoreError::Validation("child node requires a parent".into()))?;

        let mut tx = pool.begin().await?;

        let parent_story: Option<String> =
            sqlx::query_scalar("SELECT story_id FROM story_nodes WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await?;
        match parent_story {
            Some(story) if story == input.story_id => {}
            _ => {
                return Err(CoreError::ParentNotFound {
                    story_id: input.story_id.clone(),
                    parent_id: parent_id.to_string(),
                }
                .into());
            }
        }

        let node = Self::insert(&mut tx, input).await?;
        tx.commit().await?;
        Ok(node)
    }

    /// Find a node by its external id.
    pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<StoryNode>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM story_nodes WHERE id = $1");
        let node = sqlx::query_as::<_, StoryNode>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(node)
    }

    /// Find a node by its external id, or fail with `NotFound`.
    pub async fn get(pool: &DbPool, id: &str) -> Result<StoryNode, DbError> {
        Self::find_by_id(pool, id).await?.ok_or_else(|| {
            DbError::Core(CoreError::NotFound {
                entity: "story_node",
                id: id.to_string(),
            })
        })
    }

    /// All nodes of a story in creation order.
    pub async fn list_by_story(pool: &DbPool, story_id: &str) -> Result<Vec<StoryNode>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM story_nodes WHERE story_id = $1 ORDER BY seq ASC");
        let nodes = sqlx::query_as::<_, StoryNode>(&query)
            .bind(story_id)
            .fetch_all(pool)
            .await?;
        Ok(nodes)
    }

    /// Whether any node exists for the story.
    pub async fn story_exists(pool: &DbPool, story_id: &str) -> Result<bool, DbError> {
        let seq: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM story_nodes WHERE story_id = $1 LIMIT 1")
                .bind(story_id)
                .fetch_optional(pool)
                .await?;
        Ok(seq.is_some())
    }

    /// The most recently created completed node of a story, if any.
    pub async fn latest_completed(
        pool: &DbPool,
        story_id: &str,
    ) -> Result<Option<StoryNode>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM story_nodes \
             WHERE story_id = $1 AND status = $2 \
             ORDER BY seq DESC LIMIT 1"
        );
        let node = sqlx::query_as::<_, StoryNode>(&query)
            .bind(story_id)
            .bind(NodeStatus::Completed.as_str())
            .fetch_optional(pool)
            .await?;
        Ok(node)
    }

    /// Move a node from `pending` to `processing`.
    pub async fn mark_processing(pool: &DbPool, id: &str) -> Result<StoryNode, DbError> {
        let mut tx = pool.begin().await?;
        Self::check_transition(&mut tx, id, NodeStatus::Processing).await?;

        let query = format!("UPDATE story_nodes SET status = $2 WHERE id = $1 RETURNING {COLUMNS}");
        let node = sqlx::query_as::<_, StoryNode>(&query)
            .bind(id)
            .bind(NodeStatus::Processing.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(node)
    }

    /// Mark a node completed, attaching its media keys and continuation
    /// options in the same write.
    pub async fn complete(
        pool: &DbPool,
        id: &str,
        video_key: &str,
        frame_key: &str,
        options: &[StoryOption],
        source: OptionsSource,
    ) -> Result<StoryNode, DbError> {
        let mut tx = pool.begin().await?;
        Self::check_transition(&mut tx, id, NodeStatus::Completed).await?;

        let query = format!(
            "UPDATE story_nodes \
             SET status = $2, video_key = $3, frame_key = $4, \
                 options = $5, options_source = $6, \
                 error_code = NULL, error_message = NULL \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let node = sqlx::query_as::<_, StoryNode>(&query)
            .bind(id)
            .bind(NodeStatus::Completed.as_str())
            .bind(video_key)
            .bind(frame_key)
            .bind(Json(options.to_vec()))
            .bind(source.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(node)
    }

    /// Mark a node failed with a stable error code and human-readable message.
    pub async fn fail(
        pool: &DbPool,
        id: &str,
        error_code: &str,
        error_message: &str,
    ) -> Result<StoryNode, DbError> {
        let mut tx = pool.begin().await?;
        Self::check_transition(&mut tx, id, NodeStatus::Failed).await?;

        let query = format!(
            "UPDATE story_nodes \
             SET status = $2, error_code = $3, error_message = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let node = sqlx::query_as::<_, StoryNode>(&query)
            .bind(id)
            .bind(NodeStatus::Failed.as_str())
            .bind(error_code)
            .bind(error_message)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(node)
    }

    /// Overwrite a node's provider prompt (moderation retry softening).
    pub async fn set_prompt(pool: &DbPool, id: &str, prompt: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE story_nodes SET prompt = $2 WHERE id = $1")
            .bind(id)
            .bind(prompt)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "story_node",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Shared insert used by `create_root` / `create_child`.
    async fn insert(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        input: &NewNode,
    ) -> Result<StoryNode, DbError> {
        let query = format!(
            "INSERT INTO story_nodes \
                 (id, story_id, parent_id, choice_label, prompt, base_prompt, \
                  status, seconds, size, model, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        let now: Timestamp = chrono::Utc::now();
        let node = sqlx::query_as::<_, StoryNode>(&query)
            .bind(&input.id)
            .bind(&input.story_id)
            .bind(&input.parent_id)
            .bind(&input.choice_label)
            .bind(&input.prompt)
            .bind(&input.base_prompt)
            .bind(NodeStatus::Pending.as_str())
            .bind(input.seconds)
            .bind(&input.size)
            .bind(&input.model)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
        Ok(node)
    }

    /// Load the node's current status and verify the requested transition.
    async fn check_transition(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        id: &str,
        to: NodeStatus,
    ) -> Result<(), DbError> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM story_nodes WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        let current = current.ok_or(CoreError::NotFound {
            entity: "story_node",
            id: id.to_string(),
        })?;
        let from = NodeStatus::parse(&current)?;
        status::validate_transition(from, to)?;
        Ok(())
    }
}
