//! Story-beat assembly from the persisted tree.
//!
//! Context for prompt composition and option suggestion comes from the
//! branch actually taken — the path from the root to the node in question —
//! never from a story-wide running summary, which would mix in beats from
//! abandoned forks. Rendering and budgeting live in
//! `storyreel_core::prompt`; this module only walks the tree.

use std::collections::HashMap;

use storyreel_core::prompt::{choice_beat, setup_beat};
use storyreel_db::models::StoryNode;

/// Story beats along the path root -> `node_id`, oldest first.
///
/// The root contributes a `Setup:` beat from its authored prompt; every
/// descendant contributes a `Choice: ... Next: ...` beat. Beats are built
/// from `base_prompt` (the author's text), not the composed/softened
/// provider prompt, so context never nests context. An unknown `node_id`
/// or a broken parent link yields the beats of the reachable suffix.
pub fn path_beats(nodes: &[StoryNode], node_id: &str) -> Vec<String> {
    let by_id: HashMap<&str, &StoryNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut path: Vec<&StoryNode> = Vec::new();
    let mut cursor = by_id.get(node_id).copied();
    while let Some(node) = cursor {
        path.push(node);
        cursor = node
            .parent_id
            .as_deref()
            .and_then(|pid| by_id.get(pid).copied());
    }
    path.reverse();

    path.iter()
        .map(|node| match (&node.parent_id, &node.choice_label) {
            (None, _) => setup_beat(&node.base_prompt),
            (Some(_), Some(label)) => choice_beat(label, &node.base_prompt),
            (Some(_), None) => choice_beat("", &node.base_prompt),
        })
        .collect()
}
