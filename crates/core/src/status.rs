//! Node lifecycle statuses, legal transitions, and failure codes.
//!
//! A node is created `pending`, moves to `processing` when the provider
//! first reports progress, and ends in `completed` or `failed`. The only
//! self-transition is `processing -> processing`, which covers the single
//! permitted moderation retry (the node stays in flight while its active
//! job is swapped and its prompt softened).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Node status
// ---------------------------------------------------------------------------

/// Lifecycle status of a story node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl NodeStatus {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Processing => "processing",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        }
    }

    /// Parse a storage string back into a status.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(NodeStatus::Pending),
            "processing" => Ok(NodeStatus::Processing),
            "completed" => Ok(NodeStatus::Completed),
            "failed" => Ok(NodeStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown node status: '{other}'"
            ))),
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }
}

/// Whether `from -> to` is a legal node status transition.
///
/// Legal moves: `pending -> processing`, `pending -> failed` (submission
/// rejected before the provider ever reported progress),
/// `processing -> processing` (moderation retry), and
/// `processing -> {completed, failed}`. Terminal states admit nothing.
pub fn can_transition(from: NodeStatus, to: NodeStatus) -> bool {
    use NodeStatus::*;
    matches!(
        (from, to),
        (Pending, Processing)
            | (Pending, Failed)
            | (Processing, Processing)
            | (Processing, Completed)
            | (Processing, Failed)
    )
}

/// Validate a node status transition, rejecting illegal moves.
pub fn validate_transition(from: NodeStatus, to: NodeStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Illegal node status transition: {} -> {}",
            from.as_str(),
            to.as_str()
        )))
    }
}

// ---------------------------------------------------------------------------
// Options provenance
// ---------------------------------------------------------------------------

/// Where a node's continuation options came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionsSource {
    /// Proposed by the suggestion model.
    Model,
    /// The deterministic built-in set, used when suggestion failed.
    Fallback,
    /// Reused from options already persisted on the node.
    Cached,
}

impl OptionsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionsSource::Model => "model",
            OptionsSource::Fallback => "fallback",
            OptionsSource::Cached => "cached",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "model" => Ok(OptionsSource::Model),
            "fallback" => Ok(OptionsSource::Fallback),
            "cached" => Ok(OptionsSource::Cached),
            other => Err(CoreError::Validation(format!(
                "Unknown options source: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure codes
// ---------------------------------------------------------------------------

/// The provider rejected the submission outright.
pub const CODE_SUBMISSION_REJECTED: &str = "submission_rejected";

/// A second moderation block after the single softened retry.
pub const CODE_MODERATION_EXHAUSTED: &str = "moderation_exhausted";

/// The provider explicitly failed the generation job.
pub const CODE_PROVIDER_FAILED: &str = "provider_failed";

/// Consecutive poll transports failed past the configured cap.
pub const CODE_PROVIDER_UNREACHABLE: &str = "provider_unreachable";

/// Last-frame extraction failed; continuity cannot be guaranteed.
pub const CODE_EXTRACTION_FAILED: &str = "extraction_failed";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- parse / as_str --

    #[test]
    fn status_strings_round_trip() {
        for status in [
            NodeStatus::Pending,
            NodeStatus::Processing,
            NodeStatus::Completed,
            NodeStatus::Failed,
        ] {
            assert_eq!(NodeStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        let err = NodeStatus::parse("done").unwrap_err();
        assert!(err.to_string().contains("Unknown node status"));
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&NodeStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    // -- can_transition --

    #[test]
    fn pending_moves_to_processing() {
        assert!(can_transition(NodeStatus::Pending, NodeStatus::Processing));
    }

    #[test]
    fn pending_fails_on_rejected_submission() {
        assert!(can_transition(NodeStatus::Pending, NodeStatus::Failed));
    }

    #[test]
    fn pending_cannot_complete_directly() {
        assert!(!can_transition(NodeStatus::Pending, NodeStatus::Completed));
    }

    #[test]
    fn processing_self_transition_allowed_for_retry() {
        assert!(can_transition(
            NodeStatus::Processing,
            NodeStatus::Processing
        ));
    }

    #[test]
    fn processing_reaches_terminal_states() {
        assert!(can_transition(NodeStatus::Processing, NodeStatus::Completed));
        assert!(can_transition(NodeStatus::Processing, NodeStatus::Failed));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for terminal in [NodeStatus::Completed, NodeStatus::Failed] {
            for to in [
                NodeStatus::Pending,
                NodeStatus::Processing,
                NodeStatus::Completed,
                NodeStatus::Failed,
            ] {
                assert!(!can_transition(terminal, to), "{terminal:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn validate_transition_reports_both_states() {
        let err = validate_transition(NodeStatus::Completed, NodeStatus::Pending).unwrap_err();
        assert!(err.to_string().contains("completed -> pending"));
    }

    // -- is_terminal --

    #[test]
    fn terminal_detection() {
        assert!(NodeStatus::Completed.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
        assert!(!NodeStatus::Processing.is_terminal());
    }

    // -- OptionsSource --

    #[test]
    fn options_source_round_trip() {
        for source in [
            OptionsSource::Model,
            OptionsSource::Fallback,
            OptionsSource::Cached,
        ] {
            assert_eq!(OptionsSource::parse(source.as_str()).unwrap(), source);
        }
    }

    #[test]
    fn unknown_options_source_rejected() {
        assert!(OptionsSource::parse("llm").is_err());
    }
}
