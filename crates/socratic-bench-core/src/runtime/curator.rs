// crates/socratic-bench-core/src/runtime/curator.rs
// ============================================================================
// Module: Run Curator
// Description: Materializes run summaries and weekly period aggregates.
// Purpose: Converge aggregates deterministically under duplicate signals.
// Dependencies: crate::core, crate::interfaces, crate::runtime, crate::telemetry
// ============================================================================

//! ## Overview
//! The curator consumes `run-judged` signals. Output is a pure function of
//! the run's records: the run summary recomputes from scratch on every
//! delivery, curated artifacts serialize canonically so duplicates are
//! byte-identical, and the weekly aggregate merges through a commutative
//! contribution set behind a versioned conditional write. A turn/judgment
//! count mismatch is not an error; the signal is abandoned and a later one
//! re-triggers once the last judgment lands.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::catalog;
use crate::core::catalog::CatalogError;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::records::JudgmentRecord;
use crate::core::records::RunRecord;
use crate::core::records::TurnRecord;
use crate::core::rubric::Rubric;
use crate::core::rubric::RubricError;
use crate::core::summary::Contribution;
use crate::core::summary::CuratedRunArtifact;
use crate::core::summary::CuratedTurnEntry;
use crate::core::summary::CuratedWeeklyArtifact;
use crate::core::summary::PeriodAggregate;
use crate::core::summary::RunSummary;
use crate::core::summary::SummaryError;
use crate::core::summary::compute_run_summary;
use crate::core::time::TimeError;
use crate::interfaces::BlobError;
use crate::interfaces::BlobStore;
use crate::interfaces::CasOutcome;
use crate::interfaces::IndexError;
use crate::interfaces::IndexStore;
use crate::interfaces::RunJudgedSignal;
use crate::runtime::access;
use crate::runtime::access::AccessError;
use crate::telemetry::Component;
use crate::telemetry::MetricsRecorder;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum conditional-write attempts for the period aggregate.
const MAX_AGGREGATE_CAS_ATTEMPTS: u32 = 16;

// ============================================================================
// SECTION: Curator Errors
// ============================================================================

/// Curator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; transience is encoded
///   via [`CuratorError::is_transient`].
#[derive(Debug, Error)]
pub enum CuratorError {
    /// Run metadata does not exist for the signal.
    #[error("run not found: {0}")]
    MissingRun(String),
    /// Typed access failure.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// Index tier failure.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Blob tier failure.
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// Record codec failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Canonicalization failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Rubric resolution failure.
    #[error(transparent)]
    Rubric(#[from] RubricError),
    /// Summary computation failure.
    #[error(transparent)]
    Summary(#[from] SummaryError),
    /// Period key derivation failure.
    #[error(transparent)]
    Time(#[from] TimeError),
    /// Aggregate conditional-write attempts exhausted under contention.
    #[error("aggregate cas attempts exhausted for {0}")]
    CasExhausted(String),
}

impl CuratorError {
    /// Returns true for failure classes worth a queue redelivery.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Access(AccessError::Index(_) | AccessError::CasExhausted(_))
            | Self::Index(_)
            | Self::Blob(_)
            | Self::CasExhausted(_) => true,
            Self::MissingRun(_)
            | Self::Access(_)
            | Self::Catalog(_)
            | Self::Hash(_)
            | Self::Rubric(_)
            | Self::Summary(_)
            | Self::Time(_) => false,
        }
    }
}

// ============================================================================
// SECTION: Curation Outcome
// ============================================================================

/// Outcome of one signal delivery.
///
/// # Invariants
/// - Variants are stable and exhaustive for curation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurationOutcome {
    /// Summary and aggregate were materialized (or reconfirmed).
    Curated,
    /// Turn and judgment counts have not converged yet; signal abandoned.
    NotConverged,
}

// ============================================================================
// SECTION: Curator
// ============================================================================

/// Curator component consuming `run-judged` signals.
///
/// # Invariants
/// - Recomputation is always safe; no state is trusted across deliveries.
pub struct Curator {
    /// Index tier.
    index: Arc<dyn IndexStore>,
    /// Blob tier.
    blobs: Arc<dyn BlobStore>,
    /// Metrics recorder.
    metrics: Arc<dyn MetricsRecorder>,
}

impl Curator {
    /// Creates a curator over the provided substrates.
    #[must_use]
    pub fn new(
        index: Arc<dyn IndexStore>,
        blobs: Arc<dyn BlobStore>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            index,
            blobs,
            metrics,
        }
    }

    /// Handles one `run-judged` signal.
    ///
    /// # Errors
    ///
    /// Returns [`CuratorError`] on substrate failures; count mismatches are
    /// reported through [`CurationOutcome::NotConverged`] instead.
    pub fn handle(&self, signal: &RunJudgedSignal) -> Result<CurationOutcome, CuratorError> {
        let run = access::load_run(self.index.as_ref(), &signal.run_id)?
            .ok_or_else(|| CuratorError::MissingRun(signal.run_id.as_str().to_string()))?;

        let turns = access::load_turns(self.index.as_ref(), &run.run_id)?;
        let judgments = access::load_judgments(self.index.as_ref(), &run.run_id)?;

        let (turns, judgments) = if signal.force {
            pair_judged_turns(turns, judgments)
        } else if turns.len() == judgments.len() && !turns.is_empty() {
            (turns, judgments)
        } else {
            self.metrics.record_invariant_skip(Component::Curator);
            return Ok(CurationOutcome::NotConverged);
        };
        if turns.is_empty() {
            self.metrics.record_invariant_skip(Component::Curator);
            return Ok(CurationOutcome::NotConverged);
        }

        let rubric = Rubric::for_version(&run.rubric_version)?;
        let summary = compute_run_summary(&run, &turns, &judgments, &rubric)?;

        self.persist_summary(&summary, &turns, &judgments)?;
        self.merge_period_aggregate(&run, &summary)?;
        self.metrics.record_curation();
        Ok(CurationOutcome::Curated)
    }

    /// Persists the summary index record and the curated run artifact.
    fn persist_summary(
        &self,
        summary: &RunSummary,
        turns: &[TurnRecord],
        judgments: &[JudgmentRecord],
    ) -> Result<(), CuratorError> {
        self.index.put(&catalog::encode_summary(summary)?)?;

        let entries = turns
            .iter()
            .zip(judgments.iter())
            .map(|(turn, judgment)| CuratedTurnEntry {
                turn_index: turn.turn_index,
                student_text: turn.student_text.clone(),
                ai_text: turn.ai_text.clone(),
                rubric_scores: judgment.rubric_scores.clone(),
                boolean_scores: judgment.boolean_scores.clone(),
                judge_error: judgment.error.clone(),
            })
            .collect();
        let artifact = CuratedRunArtifact {
            summary: summary.clone(),
            turns: entries,
        };
        let bytes = canonical_json_bytes(&artifact)?;
        self.blobs.put(&catalog::curated_run_path(&summary.run_id), &bytes)?;
        Ok(())
    }

    /// Merges the run's contribution into the weekly aggregate behind a
    /// versioned conditional write, then persists the weekly artifact.
    fn merge_period_aggregate(
        &self,
        run: &RunRecord,
        summary: &RunSummary,
    ) -> Result<(), CuratorError> {
        let period_key = run.created_at.period_key()?;
        let key = catalog::period_aggregate_key(&period_key, &run.model_id);
        let contribution = Contribution::from_summary(summary);

        let mut final_aggregate = None;
        for _attempt in 0..MAX_AGGREGATE_CAS_ATTEMPTS {
            let stored = self.index.get(&key)?;
            let (mut aggregate, revision) = match &stored {
                Some(record) => (catalog::decode_period_aggregate(record)?, record.revision),
                None => {
                    (PeriodAggregate::empty(period_key.clone(), run.model_id.clone()), 0)
                }
            };

            if !aggregate.absorb(run.run_id.clone(), contribution.clone()) {
                final_aggregate = Some(aggregate);
                break;
            }

            let record = catalog::encode_period_aggregate(&aggregate)?;
            match self.index.put_versioned(&record, revision)? {
                CasOutcome::Applied => {
                    final_aggregate = Some(aggregate);
                    break;
                }
                CasOutcome::Conflict => {}
            }
        }

        let Some(aggregate) = final_aggregate else {
            return Err(CuratorError::CasExhausted(key.partition_key));
        };

        let artifact = CuratedWeeklyArtifact {
            aggregate,
        };
        let bytes = canonical_json_bytes(&artifact)?;
        self.blobs.put(&catalog::curated_weekly_path(&period_key, &run.model_id), &bytes)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Forced Pairing
// ============================================================================

/// Pairs turns with their judgments for force-curation, dropping turns whose
/// judgments are missing (manual backfill path).
fn pair_judged_turns(
    turns: Vec<TurnRecord>,
    judgments: Vec<JudgmentRecord>,
) -> (Vec<TurnRecord>, Vec<JudgmentRecord>) {
    let mut paired_turns = Vec::new();
    let mut paired_judgments = Vec::new();
    for judgment in judgments {
        if let Some(turn) = turns.iter().find(|turn| turn.turn_index == judgment.turn_index) {
            paired_turns.push(turn.clone());
            paired_judgments.push(judgment);
        }
    }
    (paired_turns, paired_judgments)
}
