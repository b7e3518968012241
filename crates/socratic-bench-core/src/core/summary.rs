// crates/socratic-bench-core/src/core/summary.rs
// ============================================================================
// Module: Socratic Bench Summaries and Aggregates
// Description: Run summaries and weekly period aggregates.
// Purpose: Derive deterministic aggregates that converge under replay.
// Dependencies: serde, crate::core::{identifiers, records, rubric, time}
// ============================================================================

//! ## Overview
//! A run summary is a pure function of the run's turns, judgments, and the
//! active rubric; recomputing it any number of times yields identical bytes.
//! Period aggregates roll summaries up per (ISO week, model) using a
//! commutative, duplicate-safe merge: the aggregate stores one contribution
//! per run and recomputes its means from that set, so any arrival order and
//! any number of duplicate deliveries converge to the same value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::DimensionName;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::PeriodKey;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ScenarioId;
use crate::core::records::JudgmentRecord;
use crate::core::records::RunRecord;
use crate::core::records::TurnRecord;
use crate::core::rubric::Rubric;
use crate::core::rubric::ScoreType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Dimension Statistics
// ============================================================================

/// Aggregate statistics for one rubric dimension across a run.
///
/// # Invariants
/// - `min <= mean <= max`.
/// - Boolean dimensions are folded in as 0/1 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    /// Mean score across judged turns.
    pub mean: f64,
    /// Minimum score across judged turns.
    pub min: f64,
    /// Maximum score across judged turns.
    pub max: f64,
}

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// Aggregation over all turns and judgments of one run.
///
/// # Invariants
/// - `compliance_rate` and `violation_rate` lie in `[0, 1]`.
/// - `first_failure_turn` lies in `[0, turn_count]`; it equals `turn_count`
///   iff `compliance_rate` is 1.
/// - Safe to recompute; identical inputs yield identical summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Summarized run identifier.
    pub run_id: RunId,
    /// Candidate model identifier.
    pub model_id: ModelId,
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Number of judged turns.
    pub turn_count: u32,
    /// Per-dimension aggregate statistics.
    pub dimension_stats: BTreeMap<DimensionName, DimensionStats>,
    /// Fraction of turns meeting every dimension-configured threshold.
    pub compliance_rate: f64,
    /// Smallest turn index failing a threshold, or `turn_count` if none.
    pub first_failure_turn: u32,
    /// Fraction of turns failing the well-formedness check.
    pub violation_rate: f64,
    /// Total prompt tokens across turns.
    pub total_input_tokens: u64,
    /// Total completion tokens across turns.
    pub total_output_tokens: u64,
    /// Aggregation timestamp, derived from the newest input record so that
    /// recomputation stays byte-identical.
    pub aggregated_at: Timestamp,
}

/// Run summary computation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Turn and judgment sets do not line up.
    #[error("turn/judgment mismatch: {0}")]
    Mismatch(String),
    /// Run has no judged turns to aggregate.
    #[error("run {0} has no judged turns")]
    Empty(String),
}

/// Computes the run summary from ordered turns and judgments.
///
/// Both slices must be ordered by turn index and cover the same dense index
/// prefix. The summary is a pure function of its inputs.
///
/// # Errors
///
/// Returns [`SummaryError::Empty`] when there are no turns and
/// [`SummaryError::Mismatch`] when the judgment set does not cover the turn
/// set exactly.
pub fn compute_run_summary(
    run: &RunRecord,
    turns: &[TurnRecord],
    judgments: &[JudgmentRecord],
    rubric: &Rubric,
) -> Result<RunSummary, SummaryError> {
    if turns.is_empty() {
        return Err(SummaryError::Empty(run.run_id.as_str().to_string()));
    }
    if turns.len() != judgments.len() {
        return Err(SummaryError::Mismatch(format!(
            "run {} has {} turns but {} judgments",
            run.run_id,
            turns.len(),
            judgments.len()
        )));
    }
    for (turn, judgment) in turns.iter().zip(judgments.iter()) {
        if turn.turn_index != judgment.turn_index {
            return Err(SummaryError::Mismatch(format!(
                "run {} turn {} paired with judgment {}",
                run.run_id, turn.turn_index, judgment.turn_index
            )));
        }
    }

    let turn_count = u32::try_from(turns.len()).unwrap_or(u32::MAX);
    let count = to_f64(turns.len());

    let mut dimension_stats: BTreeMap<DimensionName, DimensionStats> = BTreeMap::new();
    for dimension in &rubric.dimensions {
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for judgment in judgments {
            let score = dimension_score(judgment, &dimension.name, dimension.score_type);
            sum += score;
            min = min.min(score);
            max = max.max(score);
        }
        dimension_stats.insert(
            dimension.name.clone(),
            DimensionStats {
                mean: sum / count,
                min,
                max,
            },
        );
    }

    let mut compliant_turns = 0u32;
    let mut first_failure_turn = turn_count;
    let mut violations = 0u32;
    for judgment in judgments {
        if turn_is_compliant(judgment, rubric) {
            compliant_turns += 1;
        } else if judgment.turn_index < first_failure_turn {
            first_failure_turn = judgment.turn_index;
        }
        if !judgment.heuristic_features.well_formed {
            violations += 1;
        }
    }

    let total_input_tokens = turns.iter().map(|turn| turn.input_token_count).sum();
    let total_output_tokens = turns.iter().map(|turn| turn.output_token_count).sum();
    let aggregated_at = newest_input_timestamp(turns, judgments);

    Ok(RunSummary {
        run_id: run.run_id.clone(),
        model_id: run.model_id.clone(),
        scenario_id: run.scenario_id.clone(),
        turn_count,
        dimension_stats,
        compliance_rate: f64::from(compliant_turns) / count,
        first_failure_turn,
        violation_rate: f64::from(violations) / count,
        total_input_tokens,
        total_output_tokens,
        aggregated_at,
    })
}

/// Returns the numeric value of a dimension for one judgment.
fn dimension_score(
    judgment: &JudgmentRecord,
    name: &DimensionName,
    score_type: ScoreType,
) -> f64 {
    match score_type {
        ScoreType::Boolean => {
            judgment.boolean_scores.get(name).map_or(0.0, |flag| f64::from(u8::from(*flag)))
        }
        ScoreType::Continuous { .. } | ScoreType::Integer { .. } | ScoreType::Count => {
            judgment.rubric_scores.get(name).copied().unwrap_or(0.0)
        }
    }
}

/// Returns true when a judged turn meets every dimension-configured threshold.
fn turn_is_compliant(judgment: &JudgmentRecord, rubric: &Rubric) -> bool {
    rubric.dimensions.iter().all(|dimension| {
        dimension.threshold.is_none_or(|threshold| {
            dimension_score(judgment, &dimension.name, dimension.score_type) >= threshold
        })
    })
}

/// Returns the newest persistence timestamp across the input records.
fn newest_input_timestamp(turns: &[TurnRecord], judgments: &[JudgmentRecord]) -> Timestamp {
    let newest_turn = turns.iter().map(|turn| turn.created_at).max().unwrap_or_default();
    let newest_judgment =
        judgments.iter().map(|judgment| judgment.created_at).max().unwrap_or_default();
    newest_turn.max(newest_judgment)
}

/// Converts a collection length to `f64` for mean computation.
#[allow(
    clippy::cast_precision_loss,
    reason = "Turn counts are bounded by the three-digit turn cap."
)]
const fn to_f64(value: usize) -> f64 {
    value as f64
}

// ============================================================================
// SECTION: Period Aggregates
// ============================================================================

/// One run's contribution to a period aggregate.
///
/// # Invariants
/// - Values are snapshots of the contributing run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Per-dimension mean scores from the run summary.
    pub dimension_means: BTreeMap<DimensionName, f64>,
    /// Compliance rate from the run summary.
    pub compliance_rate: f64,
    /// Aggregation timestamp of the contributing summary.
    pub aggregated_at: Timestamp,
}

impl Contribution {
    /// Builds a contribution from a run summary.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            dimension_means: summary
                .dimension_stats
                .iter()
                .map(|(name, stats)| (name.clone(), stats.mean))
                .collect(),
            compliance_rate: summary.compliance_rate,
            aggregated_at: summary.aggregated_at,
        }
    }
}

/// Weekly roll-up for one (period, model) pair.
///
/// # Invariants
/// - `run_count` equals the contributor set size and is monotonic for a
///   given period key.
/// - Means are recomputed from the contributor set, so merging is
///   commutative and duplicate-safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    /// ISO week period key.
    pub period_key: PeriodKey,
    /// Candidate model identifier.
    pub model_id: ModelId,
    /// Number of contributing runs.
    pub run_count: u32,
    /// Mean of contributing runs' per-dimension means.
    pub dimension_means: BTreeMap<DimensionName, f64>,
    /// Mean of contributing runs' compliance rates.
    pub compliance_mean: f64,
    /// Newest contribution timestamp.
    pub last_updated_at: Timestamp,
    /// Contribution snapshots keyed by run identifier.
    pub contributing_runs: BTreeMap<RunId, Contribution>,
}

impl PeriodAggregate {
    /// Creates an empty aggregate for a (period, model) pair.
    #[must_use]
    pub const fn empty(period_key: PeriodKey, model_id: ModelId) -> Self {
        Self {
            period_key,
            model_id,
            run_count: 0,
            dimension_means: BTreeMap::new(),
            compliance_mean: 0.0,
            last_updated_at: Timestamp::from_unix_millis(0),
            contributing_runs: BTreeMap::new(),
        }
    }

    /// Absorbs one run's contribution and recomputes the aggregate.
    ///
    /// Returns false when the identical contribution is already present, in
    /// which case the aggregate is left untouched.
    pub fn absorb(&mut self, run_id: RunId, contribution: Contribution) -> bool {
        if self.contributing_runs.get(&run_id) == Some(&contribution) {
            return false;
        }
        self.contributing_runs.insert(run_id, contribution);
        self.recompute();
        true
    }

    /// Recomputes derived fields from the contributor set.
    fn recompute(&mut self) {
        self.run_count = u32::try_from(self.contributing_runs.len()).unwrap_or(u32::MAX);
        let count = to_f64(self.contributing_runs.len().max(1));

        let mut dimension_sums: BTreeMap<DimensionName, f64> = BTreeMap::new();
        let mut compliance_sum = 0.0;
        let mut newest = Timestamp::from_unix_millis(0);
        for contribution in self.contributing_runs.values() {
            for (name, mean) in &contribution.dimension_means {
                *dimension_sums.entry(name.clone()).or_insert(0.0) += *mean;
            }
            compliance_sum += contribution.compliance_rate;
            newest = newest.max(contribution.aggregated_at);
        }

        self.dimension_means =
            dimension_sums.into_iter().map(|(name, sum)| (name, sum / count)).collect();
        self.compliance_mean = compliance_sum / count;
        self.last_updated_at = newest;
    }
}

// ============================================================================
// SECTION: Curated Artifacts
// ============================================================================

/// Embedded turn/judgment pair inside the curated run artifact.
///
/// # Invariants
/// - `turn_index` matches between the embedded turn and judgment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedTurnEntry {
    /// Turn index.
    pub turn_index: u32,
    /// Student-side utterance.
    pub student_text: String,
    /// AI-side utterance.
    pub ai_text: String,
    /// Numeric dimension scores.
    pub rubric_scores: BTreeMap<DimensionName, f64>,
    /// Boolean dimension scores.
    pub boolean_scores: BTreeMap<DimensionName, bool>,
    /// Judge error flag, when scoring failed semantically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_error: Option<String>,
}

/// Curated run artifact persisted to the blob tier.
///
/// # Invariants
/// - Serialized canonically so duplicate curation writes identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedRunArtifact {
    /// Run summary.
    pub summary: RunSummary,
    /// Embedded per-turn detail.
    pub turns: Vec<CuratedTurnEntry>,
}

/// Curated weekly artifact persisted to the blob tier.
///
/// # Invariants
/// - Serialized canonically so convergent aggregates write identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedWeeklyArtifact {
    /// Period aggregate snapshot.
    pub aggregate: PeriodAggregate,
}
