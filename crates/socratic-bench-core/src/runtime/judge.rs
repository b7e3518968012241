// crates/socratic-bench-core/src/runtime/judge.rs
// ============================================================================
// Module: Turn Judge
// Description: Scores persisted turns and detects run completion.
// Purpose: Produce exactly one judgment per turn and signal curation.
// Dependencies: crate::core, crate::interfaces, crate::runtime, crate::telemetry
// ============================================================================

//! ## Overview
//! The judge consumes judgment-queue jobs. Turns may be judged in any order;
//! scoring never reads prior judgments (trajectory metrics belong to the
//! curator). After every judgment write the judge performs completion
//! detection by comparing the turn and judgment counts in the run's
//! partition, emitting a `run-judged` signal when they match. Detection is
//! eventually consistent and may emit duplicates across concurrent workers;
//! the curator tolerates both.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::catalog;
use crate::core::catalog::CatalogError;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::manifest::Manifest;
use crate::core::records::HeuristicFeatures;
use crate::core::records::JudgmentArtifact;
use crate::core::records::JudgmentRecord;
use crate::core::records::RunRecord;
use crate::core::records::RunStatus;
use crate::core::records::TurnRecord;
use crate::core::rubric::Rubric;
use crate::core::rubric::RubricError;
use crate::core::rubric::ScoringMode;
use crate::core::time::Clock;
use crate::interfaces::BlobError;
use crate::interfaces::BlobStore;
use crate::interfaces::CreateOutcome;
use crate::interfaces::IndexError;
use crate::interfaces::IndexStore;
use crate::interfaces::InvokerError;
use crate::interfaces::JudgeJob;
use crate::interfaces::ModelInvoker;
use crate::interfaces::RunJudgedSignal;
use crate::interfaces::SignalBus;
use crate::interfaces::SignalError;
use crate::runtime::access;
use crate::runtime::access::AccessError;
use crate::runtime::heuristics::extract_features;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::scoring::JudgeBinding;
use crate::runtime::scoring::ScoreSet;
use crate::runtime::scoring::heuristic_score_set;
use crate::runtime::scoring::llm_score_set;
use crate::telemetry::MetricsRecorder;

// ============================================================================
// SECTION: Judge Errors
// ============================================================================

/// Judge errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; transience is encoded
///   via [`JudgeError::is_transient`].
#[derive(Debug, Error)]
pub enum JudgeError {
    /// Turn is not yet visible in the index (race with the runner).
    #[error("turn not yet visible: {run_id}/{turn_index}")]
    TurnNotVisible {
        /// Run identifier.
        run_id: String,
        /// Turn index.
        turn_index: u32,
    },
    /// Run metadata does not exist for the job.
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
    /// Model invoker failure after in-handler retries.
    #[error(transparent)]
    Invoker(#[from] InvokerError),
    /// Signal bus failure.
    #[error(transparent)]
    Signal(#[from] SignalError),
}

impl JudgeError {
    /// Returns true for failure classes worth a queue redelivery.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::TurnNotVisible { .. }
            | Self::Access(AccessError::Index(_) | AccessError::CasExhausted(_))
            | Self::Index(_)
            | Self::Blob(_)
            | Self::Signal(_) => true,
            Self::Invoker(err) => err.is_transient(),
            Self::MissingRun(_)
            | Self::Access(_)
            | Self::Catalog(_)
            | Self::Hash(_)
            | Self::Rubric(_) => false,
        }
    }
}

// ============================================================================
// SECTION: Judge Configuration
// ============================================================================

/// Tunables for the judge worker.
///
/// # Invariants
/// - `judge_deadline` bounds each judge model invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeConfig {
    /// Deadline for one judge model invocation.
    pub judge_deadline: Duration,
    /// In-handler retry policy for transient invoker failures.
    pub retry: RetryPolicy,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            judge_deadline: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================================
// SECTION: Judge
// ============================================================================

/// Judge component consuming judgment-queue jobs.
///
/// # Invariants
/// - Judgment writes are conditional on absence; exactly one write per
///   (run, turn) succeeds.
pub struct Judge {
    /// Index tier.
    index: Arc<dyn IndexStore>,
    /// Blob tier.
    blobs: Arc<dyn BlobStore>,
    /// Judge model invoker (used for LLM-assisted rubrics only).
    invoker: Arc<dyn ModelInvoker>,
    /// Completion signal bus.
    bus: Arc<dyn SignalBus>,
    /// Host clock.
    clock: Arc<dyn Clock>,
    /// Metrics recorder.
    metrics: Arc<dyn MetricsRecorder>,
    /// Worker tunables.
    config: JudgeConfig,
}

impl Judge {
    /// Creates a judge over the provided substrates.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Substrate wiring happens once per host.")]
    pub fn new(
        index: Arc<dyn IndexStore>,
        blobs: Arc<dyn BlobStore>,
        invoker: Arc<dyn ModelInvoker>,
        bus: Arc<dyn SignalBus>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsRecorder>,
        config: JudgeConfig,
    ) -> Self {
        Self {
            index,
            blobs,
            invoker,
            bus,
            clock,
            metrics,
            config,
        }
    }

    /// Handles one judgment-queue job.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError`] when the turn cannot be judged; transient
    /// classes redeliver through the queue.
    pub fn handle(&self, job: &JudgeJob) -> Result<(), JudgeError> {
        let turn_record = self.index.get(&catalog::turn_key(&job.run_id, job.turn_index))?;
        let Some(turn_record) = turn_record else {
            return Err(JudgeError::TurnNotVisible {
                run_id: job.run_id.as_str().to_string(),
                turn_index: job.turn_index,
            });
        };
        let turn = catalog::decode_turn(&turn_record)?;

        let run = access::load_run(self.index.as_ref(), &job.run_id)?
            .ok_or_else(|| JudgeError::MissingRun(job.run_id.as_str().to_string()))?;

        let already_judged =
            self.index.get(&catalog::judgment_key(&job.run_id, job.turn_index))?.is_some();
        if !already_judged {
            self.score_and_persist(&run, &turn)?;
        }

        self.detect_completion(&run)?;
        Ok(())
    }

    /// Scores the turn and persists the judgment (blob + index).
    fn score_and_persist(&self, run: &RunRecord, turn: &TurnRecord) -> Result<(), JudgeError> {
        let rubric = Rubric::for_version(&run.rubric_version)?;
        let manifest = access::load_manifest(self.index.as_ref(), &run.manifest_id)?;
        let features = extract_features(&turn.ai_text);

        let scores = match rubric.scoring_mode() {
            ScoringMode::Heuristic => heuristic_score_set(&rubric, &features),
            ScoringMode::LlmAssisted => {
                let binding = JudgeBinding {
                    invoker: self.invoker.as_ref(),
                    judge_model_id: &manifest.parameters.judge_model_id,
                    temperature: manifest.parameters.judge_temperature,
                    deadline: self.config.judge_deadline,
                    retry: self.config.retry,
                };
                let scores = llm_score_set(&rubric, turn, &binding)?;
                self.metrics.record_invoker_latency(scores.judge_latency_ms);
                scores
            }
        };

        let judgment = self.build_judgment(run, turn, &manifest, scores, &features);
        self.write_judgment_artifact(&judgment)?;
        match self.index.create(&catalog::encode_judgment(&judgment)?)? {
            CreateOutcome::Created => Ok(()),
            CreateOutcome::AlreadyExists => {
                // A concurrent worker won the write; realign the blob
                // artifact with the authoritative copy.
                let record = self
                    .index
                    .get(&catalog::judgment_key(&judgment.run_id, judgment.turn_index))?
                    .ok_or_else(|| {
                        IndexError::Corrupt(format!(
                            "judgment {}/{}",
                            judgment.run_id, judgment.turn_index
                        ))
                    })?;
                let persisted = catalog::decode_judgment(&record)?;
                self.write_judgment_artifact(&persisted)?;
                Ok(())
            }
        }
    }

    /// Assembles the judgment record from a validated score set.
    fn build_judgment(
        &self,
        run: &RunRecord,
        turn: &TurnRecord,
        manifest: &Manifest,
        scores: ScoreSet,
        features: &HeuristicFeatures,
    ) -> JudgmentRecord {
        JudgmentRecord {
            run_id: run.run_id.clone(),
            turn_index: turn.turn_index,
            rubric_scores: scores.rubric_scores,
            boolean_scores: scores.boolean_scores,
            heuristic_features: features.clone(),
            judge_model_id: manifest.parameters.judge_model_id.clone(),
            judge_latency_ms: scores.judge_latency_ms,
            created_at: self.clock.now(),
            error: scores.error,
            blob_pointer: catalog::judgment_blob_path(&run.run_id, turn.turn_index),
        }
    }

    /// Writes the blob-tier judgment artifact.
    fn write_judgment_artifact(&self, judgment: &JudgmentRecord) -> Result<(), JudgeError> {
        let artifact = JudgmentArtifact {
            run_id: judgment.run_id.clone(),
            turn_index: judgment.turn_index,
            rubric_scores: judgment.rubric_scores.clone(),
            boolean_scores: judgment.boolean_scores.clone(),
            heuristic_features: judgment.heuristic_features.clone(),
            judge_model_id: judgment.judge_model_id.clone(),
            judge_latency_ms: judgment.judge_latency_ms,
            error: judgment.error.clone(),
            created_at: judgment.created_at,
        };
        let bytes = canonical_json_bytes(&artifact)?;
        self.blobs.put(&judgment.blob_pointer, &bytes)?;
        Ok(())
    }

    /// Emits the `run-judged` signal when every persisted turn has a
    /// judgment. Duplicate emissions across concurrent workers are expected.
    fn detect_completion(&self, run: &RunRecord) -> Result<(), JudgeError> {
        let current = access::load_run(self.index.as_ref(), &run.run_id)?
            .ok_or_else(|| JudgeError::MissingRun(run.run_id.as_str().to_string()))?;
        if !matches!(current.status, RunStatus::Running | RunStatus::Completed) {
            return Ok(());
        }

        let partition = catalog::run_partition(&run.run_id);
        let turn_count = self.index.count_partition(&partition, catalog::TURN_SORT_PREFIX)?;
        let judge_count = self.index.count_partition(&partition, catalog::JUDGE_SORT_PREFIX)?;
        if turn_count > 0 && turn_count == judge_count {
            self.bus.emit(&RunJudgedSignal {
                run_id: run.run_id.clone(),
                force: false,
            })?;
            self.metrics.record_completion_signal();
        }
        Ok(())
    }
}
