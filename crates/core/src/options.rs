//! Continuation options: the three candidate next beats offered after a
//! clip completes, plus the deterministic fallback set used when the
//! suggestion model fails.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Every completed node carries exactly this many options.
pub const OPTION_COUNT: usize = 3;

/// Maximum length of an option label in characters.
pub const MAX_LABEL_LENGTH: usize = 60;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One candidate continuation for a completed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryOption {
    /// Short human-readable label shown as the choice button.
    pub label: String,
    /// The provider-facing prompt submitted if this option is chosen.
    pub provider_prompt: String,
}

impl StoryOption {
    pub fn new(label: impl Into<String>, provider_prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            provider_prompt: provider_prompt.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback set
// ---------------------------------------------------------------------------

/// The deterministic fallback options used when suggestion fails.
///
/// Picking any of these must always produce a submittable prompt, so the
/// prompts are generic continuations of whatever scene came before.
pub fn fallback_options() -> Vec<StoryOption> {
    vec![
        StoryOption::new(
            "Push forward",
            "Continue the scene with a forward movement. Dialogue: - \"Keep going!\"",
        ),
        StoryOption::new(
            "Duck into cover",
            "The character ducks into cover as something approaches. Dialogue: - \"Hold on...\"",
        ),
        StoryOption::new(
            "Change direction",
            "The scene shifts direction to reveal a new path. Dialogue: - \"This way!\"",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize raw model output into exactly [`OPTION_COUNT`] usable options.
///
/// Trims fields, drops entries missing a label or prompt, clamps labels to
/// [`MAX_LABEL_LENGTH`] characters, and truncates surplus entries. Returns
/// `None` when fewer than [`OPTION_COUNT`] usable options remain — the
/// caller then substitutes [`fallback_options`].
pub fn normalize_options(raw: Vec<StoryOption>) -> Option<Vec<StoryOption>> {
    let mut cleaned: Vec<StoryOption> = raw
        .into_iter()
        .filter_map(|option| {
            let label = option.label.trim();
            let prompt = option.provider_prompt.trim();
            if label.is_empty() || prompt.is_empty() {
                return None;
            }
            let label: String = label.chars().take(MAX_LABEL_LENGTH).collect();
            Some(StoryOption::new(label, prompt))
        })
        .collect();

    if cleaned.len() < OPTION_COUNT {
        return None;
    }
    cleaned.truncate(OPTION_COUNT);
    Some(cleaned)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
