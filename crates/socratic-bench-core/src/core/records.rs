// crates/socratic-bench-core/src/core/records.rs
// ============================================================================
// Module: Socratic Bench Pipeline Records
// Description: Run, turn, and judgment records with lifecycle invariants.
// Purpose: Capture the durable state machine driven by the pipeline workers.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Records in this module are the durable units of pipeline state. A run owns
//! a dense, zero-based sequence of turns and exactly one judgment per turn.
//! Turns and judgments are immutable once written; run metadata evolves along
//! a constrained status lifecycle. Blob-tier artifact shapes mirror the index
//! records with the persona and dialogue text embedded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DimensionName;
use crate::core::identifiers::ManifestId;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::RubricVersion;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ScenarioId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Transitions move forward only; see [`RunStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run metadata exists; no worker has picked up the job yet.
    Pending,
    /// A runner is driving (or has driven) the dialogue loop.
    Running,
    /// All turns are persisted and the runner finished cleanly.
    Completed,
    /// The runner recorded a failure; redelivery may reopen the run.
    Failed,
}

impl RunStatus {
    /// Returns true when a transition to `next` is admissible.
    ///
    /// `Completed` is terminal. `Failed` may reopen to `Running` because a
    /// queue redelivery of the dialogue job resumes the run from its first
    /// missing turn.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Running | Self::Completed | Self::Failed)
                | (Self::Failed, Self::Running | Self::Failed)
        )
    }

    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

// ============================================================================
// SECTION: Run Metadata
// ============================================================================

/// Metadata record for one (manifest, model, scenario) execution instance.
///
/// # Invariants
/// - `turn_count_actual <= turn_count_target`.
/// - `status` evolves only along admissible transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: RunId,
    /// Manifest that planned this run.
    pub manifest_id: ManifestId,
    /// Candidate model identifier.
    pub model_id: ModelId,
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Rubric version applied by the judge.
    pub rubric_version: RubricVersion,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Target number of turns (scenario target bounded by the manifest cap).
    pub turn_count_target: u32,
    /// Number of turns actually persisted.
    pub turn_count_actual: u32,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
    /// Failure description when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Turns
// ============================================================================

/// One (student, AI) exchange within a run.
///
/// # Invariants
/// - `turn_index` values form the dense prefix `{0, ..., turn_count_actual - 1}`.
/// - Written exactly once per `(run_id, turn_index)`; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Zero-based dense turn index.
    pub turn_index: u32,
    /// Student-side utterance for this turn.
    pub student_text: String,
    /// AI-side utterance for this turn.
    pub ai_text: String,
    /// Prompt token count reported by the invoker.
    pub input_token_count: u64,
    /// Completion token count reported by the invoker.
    pub output_token_count: u64,
    /// Invocation latency in milliseconds.
    pub latency_ms: u64,
    /// Persistence timestamp.
    pub created_at: Timestamp,
    /// Blob-tier pointer to the turn artifact.
    pub blob_pointer: String,
}

/// Blob-tier artifact shape for one turn.
///
/// # Invariants
/// - Mirrors the index record with the scenario persona embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnArtifact {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Zero-based dense turn index.
    pub turn_index: u32,
    /// Scenario persona active for the dialogue.
    pub persona: String,
    /// Student-side utterance.
    pub student: String,
    /// AI-side utterance.
    pub ai: String,
    /// Prompt token count.
    pub input_tokens: u64,
    /// Completion token count.
    pub output_tokens: u64,
    /// Invocation latency in milliseconds.
    pub latency_ms: u64,
    /// Persistence timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Heuristic Features
// ============================================================================

/// Deterministic text features extracted from an AI utterance.
///
/// # Invariants
/// - Pure function of the utterance text; identical text yields identical features.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeuristicFeatures {
    /// Whether the trimmed utterance ends with a question mark.
    pub ends_with_question: bool,
    /// Number of question marks in the utterance.
    pub question_count: u32,
    /// Whitespace-delimited word count.
    pub word_count: u32,
    /// Occurrences of open-prompt lexicon words.
    pub open_prompt_count: u32,
    /// Occurrences of directive lexicon phrases.
    pub directive_count: u32,
    /// Whether the utterance passes the well-formedness check.
    pub well_formed: bool,
}

// ============================================================================
// SECTION: Judgments
// ============================================================================

/// Rubric-scored evaluation of one turn.
///
/// # Invariants
/// - Exactly one judgment per turn in a completed run.
/// - The score maps cover exactly the rubric's declared dimensions.
/// - Written exactly once per `(run_id, turn_index)`; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentRecord {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Judged turn index.
    pub turn_index: u32,
    /// Numeric dimension scores in their native ranges.
    pub rubric_scores: BTreeMap<DimensionName, f64>,
    /// Boolean dimension scores.
    pub boolean_scores: BTreeMap<DimensionName, bool>,
    /// Heuristic features backing the scores.
    pub heuristic_features: HeuristicFeatures,
    /// Judge model identifier (candidate-independent).
    pub judge_model_id: ModelId,
    /// Judge latency in milliseconds (zero for pure heuristic scoring).
    pub judge_latency_ms: u64,
    /// Persistence timestamp.
    pub created_at: Timestamp,
    /// Semantic scoring failure, persisted with neutral scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Blob-tier pointer to the judgment artifact.
    pub blob_pointer: String,
}

/// Blob-tier artifact shape for one judgment.
///
/// # Invariants
/// - Mirrors the index record; the artifact is the authoritative raw copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentArtifact {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Judged turn index.
    pub turn_index: u32,
    /// Numeric dimension scores in their native ranges.
    pub rubric_scores: BTreeMap<DimensionName, f64>,
    /// Boolean dimension scores.
    pub boolean_scores: BTreeMap<DimensionName, bool>,
    /// Heuristic features backing the scores.
    pub heuristic_features: HeuristicFeatures,
    /// Judge model identifier.
    pub judge_model_id: ModelId,
    /// Judge latency in milliseconds.
    pub judge_latency_ms: u64,
    /// Semantic scoring failure, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Persistence timestamp.
    pub created_at: Timestamp,
}
