// crates/socratic-bench-core/src/runtime/heuristics.rs
// ============================================================================
// Module: Judgment Heuristics
// Description: Deterministic text features for Socratic teaching signals.
// Purpose: Convert AI utterances into the feature vector behind rubric scores.
// Dependencies: crate::core::records
// ============================================================================

//! ## Overview
//! Feature extraction is a pure function of the AI utterance text. The
//! features capture questioning form (terminal question mark, question
//! count), lexical openness (invitation words), directiveness (prescriptive
//! phrases), and a well-formedness flag used by the violation rate. Missing
//! or empty text yields all-zero features with `well_formed = false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::records::HeuristicFeatures;

// ============================================================================
// SECTION: Lexicons
// ============================================================================

/// Open-prompt lexicon: words that invite the student to reason aloud.
const OPEN_PROMPT_WORDS: &[&str] =
    &["what", "how", "why", "suppose", "imagine", "consider", "could", "would", "wonder"];

/// Directive lexicon: phrases that hand the student the answer.
const DIRECTIVE_PHRASES: &[&str] = &[
    "the answer is",
    "you should",
    "you must",
    "you need to",
    "just do",
    "simply",
    "here is the solution",
];

// ============================================================================
// SECTION: Feature Extraction
// ============================================================================

/// Extracts the deterministic feature vector from an AI utterance.
#[must_use]
pub fn extract_features(ai_text: &str) -> HeuristicFeatures {
    let trimmed = ai_text.trim();
    if trimmed.is_empty() {
        return HeuristicFeatures::default();
    }

    let lowered = trimmed.to_lowercase();
    let question_count = count_u32(trimmed.chars().filter(|ch| *ch == '?').count());
    let word_count = count_u32(trimmed.split_whitespace().count());
    let open_prompt_count = count_u32(
        lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| OPEN_PROMPT_WORDS.contains(word))
            .count(),
    );
    let directive_count = count_u32(
        DIRECTIVE_PHRASES.iter().map(|phrase| lowered.matches(phrase).count()).sum::<usize>(),
    );

    HeuristicFeatures {
        ends_with_question: trimmed.ends_with('?'),
        question_count,
        word_count,
        open_prompt_count,
        directive_count,
        well_formed: true,
    }
}

/// Saturating conversion from collection counts to `u32`.
fn count_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
