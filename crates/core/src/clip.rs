//! Clip generation parameters and their validation.
//!
//! The provider accepts a fixed set of clip durations and a `WxH` size
//! string; both are validated here before anything reaches the wire.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Clip durations (seconds) the provider accepts.
pub const ALLOWED_SECONDS: &[u32] = &[4, 8, 12];

/// Default clip duration in seconds.
pub const DEFAULT_SECONDS: u32 = 8;

/// Default clip size.
pub const DEFAULT_SIZE: &str = "1280x720";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "sora-2";

/// Maximum dimension (width or height) allowed in a size string.
const MAX_DIMENSION: u32 = 7680;

/// Maximum provider-facing prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 10_000;

/* --------------------------------------------------------------------------
Parameters
-------------------------------------------------------------------------- */

/// Parameters for one clip generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipParams {
    /// Clip duration in seconds; must be one of [`ALLOWED_SECONDS`].
    pub seconds: u32,
    /// Clip size as `WxH`, e.g. `1280x720`.
    pub size: String,
    /// Provider model identifier.
    pub model: String,
}

impl Default for ClipParams {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_SECONDS,
            size: DEFAULT_SIZE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ClipParams {
    /// Validate all fields, rejecting anything the provider would refuse.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_seconds(self.seconds)?;
        parse_size(&self.size)?;
        if self.model.is_empty() {
            return Err(CoreError::Validation(
                "Model must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Width and height parsed from the size string.
    ///
    /// Callers should have validated first; this re-parses and propagates
    /// the same error otherwise.
    pub fn dimensions(&self) -> Result<(u32, u32), CoreError> {
        parse_size(&self.size)
    }
}

/* --------------------------------------------------------------------------
Validation functions
-------------------------------------------------------------------------- */

/// Validate that the duration is one the provider accepts.
pub fn validate_seconds(seconds: u32) -> Result<(), CoreError> {
    if ALLOWED_SECONDS.contains(&seconds) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Clip duration must be one of {:?} seconds (got {seconds})",
            ALLOWED_SECONDS
        )))
    }
}

/// Parse and validate a `WxH` size string, returning `(width, height)`.
pub fn parse_size(size: &str) -> Result<(u32, u32), CoreError> {
    let (w, h) = size.split_once('x').ok_or_else(|| {
        CoreError::Validation(format!("Size must be WxH, e.g. 1280x720 (got '{size}')"))
    })?;
    let width: u32 = w
        .parse()
        .map_err(|_| CoreError::Validation(format!("Invalid width in size '{size}'")))?;
    let height: u32 = h
        .parse()
        .map_err(|_| CoreError::Validation(format!("Invalid height in size '{size}'")))?;
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Width and height must be greater than 0".to_string(),
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CoreError::Validation(format!(
            "Dimensions must not exceed {MAX_DIMENSION}px (got {width}x{height})"
        )));
    }
    Ok((width, height))
}

/// Validate a provider-facing prompt: non-empty and within length limit.
pub fn validate_prompt(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    if text.len() > MAX_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {})",
            text.len()
        )));
    }
    Ok(())
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
