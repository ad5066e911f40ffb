//! Prompt composition, story-context condensation, and moderation softening.
//!
//! Context inclusion is budgeted: only the most recent beats are kept and
//! the condensed text is hard-capped, so prompts stay bounded no matter how
//! deep a story grows. Softening is a pure, deterministic rewrite applied
//! exactly once per node before the single permitted moderation retry.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Characters of the root prompt kept in its story beat.
pub const SETUP_SNIPPET_CHARS: usize = 200;

/// Characters of a continuation prompt kept in its story beat.
pub const CHOICE_SNIPPET_CHARS: usize = 140;

/// Default number of trailing beats included as context.
pub const DEFAULT_MAX_BEATS: usize = 3;

/// Default character cap for the condensed context.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 150;

/// Guidance sentence appended by [`soften`].
pub const SOFTEN_GUIDANCE: &str = "Keep the scene calm, mild, and family-friendly.";

/// Flagged terms replaced with milder stand-ins, longest forms first so
/// e.g. `bloody` never degrades into `muddy` + a stray `y`.
const REPLACEMENT_TABLE: &[(&str, &str)] = &[
    (r"(?i)\bbloody\b", "muddy"),
    (r"(?i)\bblood\b", "mud"),
    (r"(?i)\bgory\b", "chaotic"),
    (r"(?i)\bgore\b", "debris"),
    (r"(?i)\bkillings\b", "chases"),
    (r"(?i)\bkilling\b", "chasing"),
    (r"(?i)\bkills\b", "corners"),
    (r"(?i)\bkill\b", "corner"),
    (r"(?i)\bmurders\b", "standoffs"),
    (r"(?i)\bmurder\b", "standoff"),
    (r"(?i)\bgunfire\b", "thunder"),
    (r"(?i)\bgunshots\b", "thunderclaps"),
    (r"(?i)\bgunshot\b", "thunderclap"),
    (r"(?i)\bguns\b", "props"),
    (r"(?i)\bgun\b", "prop"),
    (r"(?i)\bweapons\b", "tools"),
    (r"(?i)\bweapon\b", "tool"),
    (r"(?i)\bexplosions\b", "bursts of light"),
    (r"(?i)\bexplosion\b", "burst of light"),
    (r"(?i)\bexplodes\b", "flares up"),
    (r"(?i)\bexplode\b", "flare up"),
    (r"(?i)\bviolently\b", "abruptly"),
    (r"(?i)\bviolence\b", "commotion"),
    (r"(?i)\bviolent\b", "tense"),
    (r"(?i)\bterrifying\b", "mysterious"),
    (r"(?i)\bhorrifying\b", "strange"),
    (r"(?i)\bcorpses\b", "statues"),
    (r"(?i)\bcorpse\b", "statue"),
];

/// Intensity qualifiers removed outright (with their trailing whitespace).
const INTENSITY_PATTERN: &str =
    r"(?i)\b(brutally|savagely|viciously|graphically|horribly|extremely)\s+";

static SOFTEN_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    REPLACEMENT_TABLE
        .iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid regex"), *replacement))
        .collect()
});

static INTENSITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(INTENSITY_PATTERN).expect("valid regex"));

static SPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

// ---------------------------------------------------------------------------
// Context budget
// ---------------------------------------------------------------------------

/// Caps on how much ancestor context may flow into a composed prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBudget {
    /// Number of trailing beats kept.
    pub max_beats: usize,
    /// Hard character cap on the condensed text.
    pub max_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_beats: DEFAULT_MAX_BEATS,
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

// ---------------------------------------------------------------------------
// Story beats
// ---------------------------------------------------------------------------

/// Render the beat for a story's root node.
pub fn setup_beat(prompt: &str) -> String {
    format!("Setup: {}", truncate_chars(prompt, SETUP_SNIPPET_CHARS))
}

/// Render the beat for a continuation node.
pub fn choice_beat(choice_label: &str, prompt: &str) -> String {
    format!(
        "Choice: {}. Next: {}",
        choice_label,
        truncate_chars(prompt, CHOICE_SNIPPET_CHARS)
    )
}

/// Condense story beats (oldest-first) into a budgeted context string.
///
/// Keeps the last `max_beats` beats, joins them with single spaces, and
/// hard-truncates to `max_chars` with a `...` marker when cut.
pub fn condense(beats: &[String], budget: &ContextBudget) -> String {
    let start = beats.len().saturating_sub(budget.max_beats);
    let joined = beats[start..].join(" ");
    if joined.chars().count() <= budget.max_chars {
        return joined;
    }
    let cut: String = joined
        .chars()
        .take(budget.max_chars.saturating_sub(3))
        .collect();
    format!("{cut}...")
        .chars()
        .take(budget.max_chars)
        .collect()
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Build the provider-facing prompt, prefixing condensed context when given.
pub fn compose(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => format!("[Story context: {ctx}]\n\n{prompt}"),
        _ => prompt.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Softening
// ---------------------------------------------------------------------------

/// Deterministically soften a prompt the provider rejected on moderation
/// grounds.
///
/// Replaces flagged terms with milder stand-ins, strips intensity
/// qualifiers, collapses space runs, and appends [`SOFTEN_GUIDANCE`].
/// Idempotent: softening an already-softened prompt returns it unchanged.
pub fn soften(prompt: &str) -> String {
    let mut text = prompt.to_string();
    for (re, replacement) in SOFTEN_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    text = INTENSITY_RE.replace_all(&text, "").into_owned();
    text = SPACE_RUN_RE.replace_all(&text, " ").trim().to_string();

    if text.contains(SOFTEN_GUIDANCE) {
        return text;
    }
    if text.is_empty() {
        SOFTEN_GUIDANCE.to_string()
    } else {
        format!("{text} {SOFTEN_GUIDANCE}")
    }
}

/// Truncate to at most `max` characters (not bytes; multi-byte safe).
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- beats --

    #[test]
    fn setup_beat_format() {
        assert_eq!(setup_beat("a quiet harbor"), "Setup: a quiet harbor");
    }

    #[test]
    fn setup_beat_truncates_long_prompts() {
        let long = "p".repeat(500);
        let beat = setup_beat(&long);
        assert_eq!(beat.len(), "Setup: ".len() + SETUP_SNIPPET_CHARS);
    }

    #[test]
    fn choice_beat_format() {
        assert_eq!(
            choice_beat("Turn left", "the road forks"),
            "Choice: Turn left. Next: the road forks"
        );
    }

    #[test]
    fn choice_beat_truncates_prompt_only() {
        let long = "p".repeat(500);
        let beat = choice_beat("Go", &long);
        assert!(beat.starts_with("Choice: Go. Next: "));
        assert_eq!(
            beat.len(),
            "Choice: Go. Next: ".len() + CHOICE_SNIPPET_CHARS
        );
    }

    // -- condense --

    #[test]
    fn short_context_passes_through() {
        let beats = vec!["Setup: the harbor".to_string(), "Choice: Go. Next: out".to_string()];
        let text = condense(&beats, &ContextBudget::default());
        assert_eq!(text, "Setup: the harbor Choice: Go. Next: out");
    }

    #[test]
    fn only_trailing_beats_kept() {
        let beats: Vec<String> = (0..10).map(|i| format!("b{i}")).collect();
        let text = condense(
            &beats,
            &ContextBudget {
                max_beats: 3,
                max_chars: 500,
            },
        );
        assert_eq!(text, "b7 b8 b9");
    }

    #[test]
    fn over_budget_context_is_cut_with_marker() {
        let beats = vec!["x".repeat(400)];
        let budget = ContextBudget::default();
        let text = condense(&beats, &budget);
        assert_eq!(text.chars().count(), budget.max_chars);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn context_never_exceeds_budget_on_deep_chains() {
        // Synthetic 100-node chain; every beat is realistic length.
        let beats: Vec<String> = (0..100)
            .map(|i| choice_beat(&format!("Option {i}"), &"scene ".repeat(40)))
            .collect();
        let budget = ContextBudget::default();
        let text = condense(&beats, &budget);
        assert!(text.chars().count() <= budget.max_chars);
    }

    #[test]
    fn condense_is_multibyte_safe() {
        let beats = vec!["é".repeat(300)];
        let budget = ContextBudget::default();
        let text = condense(&beats, &budget);
        assert_eq!(text.chars().count(), budget.max_chars);
    }

    // -- compose --

    #[test]
    fn compose_without_context_returns_prompt() {
        assert_eq!(compose("ride the wave", None), "ride the wave");
    }

    #[test]
    fn compose_ignores_blank_context() {
        assert_eq!(compose("ride the wave", Some("   ")), "ride the wave");
    }

    #[test]
    fn compose_prefixes_context() {
        let out = compose("ride the wave", Some("Setup: at sea"));
        assert_eq!(out, "[Story context: Setup: at sea]\n\nride the wave");
    }

    #[test]
    fn composed_length_is_bounded_by_budget() {
        let beats: Vec<String> = (0..100).map(|i| format!("beat number {i}")).collect();
        let budget = ContextBudget::default();
        let ctx = condense(&beats, &budget);
        let out = compose("finale", Some(&ctx));
        let overhead = "[Story context: ]\n\n".len();
        assert!(out.len() <= "finale".len() + overhead + budget.max_chars);
    }

    // -- soften --

    #[test]
    fn soften_is_deterministic() {
        let p = "A violent gunfight, blood everywhere";
        assert_eq!(soften(p), soften(p));
    }

    #[test]
    fn soften_is_idempotent() {
        let once = soften("The killer fires a gun at the fleeing crowd");
        assert_eq!(soften(&once), once);
    }

    #[test]
    fn soften_replaces_flagged_terms() {
        let out = soften("blood on the floor, a gun on the table");
        assert!(!out.to_lowercase().contains("blood"));
        assert!(!out.to_lowercase().contains("gun"));
        assert!(out.contains("mud"));
        assert!(out.contains("prop"));
    }

    #[test]
    fn soften_is_case_insensitive() {
        let out = soften("BLOOD and Gore");
        assert!(!out.to_lowercase().contains("blood"));
        assert!(!out.to_lowercase().contains("gore"));
    }

    #[test]
    fn soften_strips_intensity_qualifiers() {
        let out = soften("an extremely tense chase through the market");
        assert!(!out.contains("extremely"));
        assert!(out.contains("tense chase"));
    }

    #[test]
    fn soften_appends_guidance_once() {
        let out = soften("a calm walk in the park");
        assert!(out.ends_with(SOFTEN_GUIDANCE));
        assert_eq!(out.matches(SOFTEN_GUIDANCE).count(), 1);
        let again = soften(&out);
        assert_eq!(again.matches(SOFTEN_GUIDANCE).count(), 1);
    }

    #[test]
    fn soften_handles_empty_input() {
        assert_eq!(soften(""), SOFTEN_GUIDANCE);
    }

    #[test]
    fn longer_forms_win_over_substrings() {
        // "bloody" must map to "muddy", never "mud" + "y".
        let out = soften("a bloody banner");
        assert!(out.contains("muddy banner"));
    }
}
