//! On-disk media layout.
//!
//! Videos live at `videos/{story_id}/{node_id}.mp4`, frames at
//! `frames/{story_id}/{node_id}.jpg`, both relative to the configured media
//! root. The relative key is the artifact's canonical identity: it is what
//! gets persisted on the node and what `/media/{key}` URLs are built from.

use std::path::{Path, PathBuf};

/// Error type for media store operations.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("invalid media key or id segment: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File extension used for generated clips.
pub const VIDEO_EXT: &str = "mp4";

/// File extension used for extracted frames.
pub const FRAME_EXT: &str = "jpg";

/// URL prefix the fronting server serves the media root under.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Store for generated videos and extracted frames, rooted at a directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -- keys ---------------------------------------------------------------

    /// Canonical relative key of a node's video.
    pub fn video_key(story_id: &str, node_id: &str) -> String {
        format!("videos/{story_id}/{node_id}.{VIDEO_EXT}")
    }

    /// Canonical relative key of a node's extracted last frame.
    pub fn frame_key(story_id: &str, node_id: &str) -> String {
        format!("frames/{story_id}/{node_id}.{FRAME_EXT}")
    }

    /// Public URL for a media key, for the fronting server to resolve.
    pub fn url_for(key: &str) -> String {
        format!("{MEDIA_URL_PREFIX}/{key}")
    }

    /// Resolve a relative key to an absolute path under the media root.
    ///
    /// Rejects keys that are absolute or try to escape the root.
    pub fn absolute_path(&self, key: &str) -> Result<PathBuf, MediaError> {
        if key.is_empty() || key.starts_with('/') {
            return Err(MediaError::InvalidKey(key.to_string()));
        }
        for segment in key.split('/') {
            validate_segment(segment)?;
        }
        Ok(self.root.join(key))
    }

    // -- I/O ----------------------------------------------------------------

    /// Materialize downloaded video bytes for a node. Returns the key.
    pub async fn write_video(
        &self,
        story_id: &str,
        node_id: &str,
        bytes: &[u8],
    ) -> Result<String, MediaError> {
        let key = Self::video_key(story_id, node_id);
        let path = self.absolute_path(&key)?;
        self.ensure_parent(&path).await?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key = %key, bytes = bytes.len(), "video materialized");
        Ok(key)
    }

    /// Prepare the target for a node's frame: parent directory created,
    /// `(key, absolute_path)` returned for the extractor to write into.
    pub async fn frame_target(
        &self,
        story_id: &str,
        node_id: &str,
    ) -> Result<(String, PathBuf), MediaError> {
        let key = Self::frame_key(story_id, node_id);
        let path = self.absolute_path(&key)?;
        self.ensure_parent(&path).await?;
        Ok((key, path))
    }

    /// Read an artifact's bytes by key (reference-frame attachment).
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, MediaError> {
        let path = self.absolute_path(key)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Whether an artifact exists on disk.
    pub async fn exists(&self, key: &str) -> bool {
        match self.absolute_path(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn ensure_parent(&self, path: &Path) -> Result<(), MediaError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Validate one path segment of a media key or a client-supplied id that
/// will become one (story ids arrive from the caller).
///
/// Accepts ASCII alphanumerics plus `-`, `_`, and `.`; rejects empty
/// segments, traversal, and separators.
pub fn validate_segment(segment: &str) -> Result<(), MediaError> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(MediaError::InvalidKey(segment.to_string()));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(MediaError::InvalidKey(segment.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
