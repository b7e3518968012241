// crates/socratic-bench-core/src/runtime/runner.rs
// ============================================================================
// Module: Dialogue Runner
// Description: Drives one run's dialogue to completion turn by turn.
// Purpose: Persist turns exactly once and feed the judgment queue.
// Dependencies: crate::core, crate::interfaces, crate::runtime, crate::telemetry
// ============================================================================

//! ## Overview
//! The runner consumes dialogue-queue jobs. Redelivery of the same job is
//! safe: the run resumes from the first turn index not yet persisted, turn
//! writes are conditional on absence, and judge jobs are re-enqueued for
//! already-persisted turns (duplicates are harmless, a lost enqueue is not).
//! Per-turn ordering holds within one handler invocation: the turn's index
//! write commits before its judge job is enqueued and before the next turn
//! is generated.

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
use crate::core::records::RunRecord;
use crate::core::records::RunStatus;
use crate::core::records::TurnArtifact;
use crate::core::records::TurnRecord;
use crate::core::time::Clock;
use crate::interfaces::BlobError;
use crate::interfaces::BlobStore;
use crate::interfaces::ChatMessage;
use crate::interfaces::ChatRole;
use crate::interfaces::CreateOutcome;
use crate::interfaces::IndexError;
use crate::interfaces::IndexStore;
use crate::interfaces::InvocationRequest;
use crate::interfaces::InvokerError;
use crate::interfaces::JobQueue;
use crate::interfaces::JudgeJob;
use crate::interfaces::ModelInvoker;
use crate::interfaces::QueueError;
use crate::interfaces::RunJob;
use crate::interfaces::ScenarioDescriptor;
use crate::interfaces::ScenarioError;
use crate::interfaces::ScenarioRegistry;
use crate::interfaces::StudentError;
use crate::interfaces::StudentStrategy;
use crate::runtime::access;
use crate::runtime::access::AccessError;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::blocking_sleep;
use crate::runtime::retry::with_retries;
use crate::telemetry::Component;
use crate::telemetry::MetricsRecorder;

// ============================================================================
// SECTION: Prompt Template
// ============================================================================

/// System prompt template for the tutoring dialogue.
const TUTOR_SYSTEM_PROMPT: &str = "You are a Socratic tutor. Guide the student toward \
their own understanding with probing questions. Never hand over the answer directly; \
respond to the student's latest message with at most one short paragraph that ends in \
a question. Student persona: ";

/// Builds the invocation prompt for the next turn.
///
/// The prompt contains the system template with the scenario persona, every
/// prior (student, ai) exchange in order, and the synthesized next student
/// utterance.
#[must_use]
pub fn build_dialogue_messages(
    scenario: &ScenarioDescriptor,
    history: &[TurnRecord],
    student_text: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::new(
        ChatRole::System,
        format!("{TUTOR_SYSTEM_PROMPT}{}", scenario.persona),
    ));
    for turn in history {
        messages.push(ChatMessage::new(ChatRole::User, turn.student_text.clone()));
        messages.push(ChatMessage::new(ChatRole::Assistant, turn.ai_text.clone()));
    }
    messages.push(ChatMessage::new(ChatRole::User, student_text));
    messages
}

// ============================================================================
// SECTION: Runner Errors
// ============================================================================

/// Runner errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; transience is encoded
///   via [`RunnerError::is_transient`].
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Run metadata does not exist for the job.
    #[error("run not found: {0}")]
    MissingRun(String),
    /// Scenario registry has no descriptor for the run's scenario.
    #[error("scenario not found: {0}")]
    MissingScenario(String),
    /// Typed access failure.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// Index tier failure.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Record codec failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Canonicalization failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Blob tier failure.
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// Scenario registry failure.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Student strategy failure.
    #[error(transparent)]
    Student(#[from] StudentError),
    /// Model invoker failure after in-handler retries.
    #[error(transparent)]
    Invoker(#[from] InvokerError),
    /// Judge queue failure.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Persisted turn indices are not a dense prefix.
    #[error("run {run_id} has a sparse turn sequence at index {turn_index}")]
    SparseTurns {
        /// Run identifier.
        run_id: String,
        /// First missing index.
        turn_index: u32,
    },
}

impl RunnerError {
    /// Returns true for failure classes worth a queue redelivery.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Access(err) => matches!(
                err,
                AccessError::Index(_) | AccessError::CasExhausted(_)
            ),
            Self::Index(_) | Self::Blob(_) | Self::Queue(_) => true,
            Self::Invoker(err) => err.is_transient(),
            Self::MissingRun(_)
            | Self::MissingScenario(_)
            | Self::Catalog(_)
            | Self::Hash(_)
            | Self::Scenario(_)
            | Self::Student(_)
            | Self::SparseTurns { .. } => false,
        }
    }
}

// ============================================================================
// SECTION: Runner Configuration
// ============================================================================

/// Tunables for the runner worker.
///
/// # Invariants
/// - `invoke_deadline` bounds each candidate model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Deadline for one candidate model invocation.
    pub invoke_deadline: Duration,
    /// In-handler retry policy for transient invoker failures.
    pub retry: RetryPolicy,
    /// Upper bound on completion tokens per turn, when set.
    pub max_output_tokens: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            invoke_deadline: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            max_output_tokens: Some(1_024),
        }
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runner component consuming dialogue-queue jobs.
///
/// # Invariants
/// - Handlers are idempotent under redelivery; coordination happens entirely
///   through conditional index writes.
pub struct Runner {
    /// Index tier.
    index: Arc<dyn IndexStore>,
    /// Blob tier.
    blobs: Arc<dyn BlobStore>,
    /// Scenario registry.
    scenarios: Arc<dyn ScenarioRegistry>,
    /// Candidate model invoker.
    invoker: Arc<dyn ModelInvoker>,
    /// Student-side strategy.
    student: Arc<dyn StudentStrategy>,
    /// Judgment queue fed after each persisted turn.
    judge_queue: Arc<dyn JobQueue<JudgeJob>>,
    /// Host clock.
    clock: Arc<dyn Clock>,
    /// Metrics recorder.
    metrics: Arc<dyn MetricsRecorder>,
    /// Worker tunables.
    config: RunnerConfig,
}

impl Runner {
    /// Creates a runner over the provided substrates.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Substrate wiring happens once per host.")]
    pub fn new(
        index: Arc<dyn IndexStore>,
        blobs: Arc<dyn BlobStore>,
        scenarios: Arc<dyn ScenarioRegistry>,
        invoker: Arc<dyn ModelInvoker>,
        student: Arc<dyn StudentStrategy>,
        judge_queue: Arc<dyn JobQueue<JudgeJob>>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsRecorder>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            index,
            blobs,
            scenarios,
            invoker,
            student,
            judge_queue,
            clock,
            metrics,
            config,
        }
    }

    /// Handles one dialogue-queue job.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the run cannot be driven to completion;
    /// the run record carries the failure and the message redelivers.
    pub fn handle(&self, job: &RunJob) -> Result<(), RunnerError> {
        let run = access::load_run(self.index.as_ref(), &job.run_id)?
            .ok_or_else(|| RunnerError::MissingRun(job.run_id.as_str().to_string()))?;
        if run.status == RunStatus::Completed {
            return Ok(());
        }

        match self.drive(&run) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.mark_failed(&run, &err);
                Err(err)
            }
        }
    }

    /// Drives the dialogue loop for one run.
    fn drive(&self, run: &RunRecord) -> Result<(), RunnerError> {
        let current =
            access::update_run(self.index.as_ref(), &run.run_id, self.clock.now(), |record| {
                if record.status == RunStatus::Completed {
                    return false;
                }
                record.status = RunStatus::Running;
                record.error = None;
                true
            })?;
        if current.status == RunStatus::Completed {
            return Ok(());
        }

        let manifest = access::load_manifest(self.index.as_ref(), &run.manifest_id)?;
        let scenario = self
            .scenarios
            .get(&run.scenario_id)?
            .ok_or_else(|| RunnerError::MissingScenario(run.scenario_id.as_str().to_string()))?;
        let target = scenario.turn_count_target.min(manifest.parameters.turn_cap).max(1);
        access::update_run(self.index.as_ref(), &run.run_id, self.clock.now(), |record| {
            if record.turn_count_target == target {
                return false;
            }
            record.turn_count_target = target;
            true
        })?;

        let mut history = self.resume_state(run)?;
        for turn_index in u32::try_from(history.len()).unwrap_or(u32::MAX)..target {
            let turn = self.produce_turn(run, &manifest, &scenario, &history, turn_index)?;
            self.judge_queue.enqueue(&JudgeJob {
                run_id: run.run_id.clone(),
                turn_index,
            })?;
            self.metrics.record_enqueue(Component::Runner, 1);
            history.push(turn);
        }

        access::update_run(self.index.as_ref(), &run.run_id, self.clock.now(), |record| {
            record.status = RunStatus::Completed;
            record.turn_count_actual = target;
            record.error = None;
            true
        })?;
        Ok(())
    }

    /// Loads already-persisted turns, validates density, and re-enqueues
    /// their judge jobs to cover a crash between persist and enqueue.
    fn resume_state(&self, run: &RunRecord) -> Result<Vec<TurnRecord>, RunnerError> {
        let turns = access::load_turns(self.index.as_ref(), &run.run_id)?;
        for (position, turn) in turns.iter().enumerate() {
            let expected = u32::try_from(position).unwrap_or(u32::MAX);
            if turn.turn_index != expected {
                return Err(RunnerError::SparseTurns {
                    run_id: run.run_id.as_str().to_string(),
                    turn_index: expected,
                });
            }
            self.judge_queue.enqueue(&JudgeJob {
                run_id: run.run_id.clone(),
                turn_index: turn.turn_index,
            })?;
        }
        Ok(turns)
    }

    /// Generates and persists one turn, trusting a concurrently persisted
    /// copy when the conditional write loses.
    fn produce_turn(
        &self,
        run: &RunRecord,
        manifest: &Manifest,
        scenario: &ScenarioDescriptor,
        history: &[TurnRecord],
        turn_index: u32,
    ) -> Result<TurnRecord, RunnerError> {
        if let Some(record) = self.index.get(&catalog::turn_key(&run.run_id, turn_index))? {
            return Ok(catalog::decode_turn(&record)?);
        }

        let student_text = if turn_index == 0 {
            scenario.opening_utterance.clone()
        } else {
            self.student.next_utterance(scenario, history)?
        };

        let request = InvocationRequest {
            model_id: run.model_id.clone(),
            messages: build_dialogue_messages(scenario, history, &student_text),
            temperature: manifest.parameters.temperature,
            max_output_tokens: self.config.max_output_tokens,
            deadline: self.config.invoke_deadline,
        };
        let response = with_retries(
            &self.config.retry,
            InvokerError::is_transient,
            blocking_sleep,
            |_attempt| self.invoker.invoke(&request),
        )
        .inspect_err(|err| {
            if matches!(err, InvokerError::Throttled(_)) {
                self.metrics.record_invoker_throttle();
            }
        })?;
        self.metrics.record_invoker_latency(response.latency_ms);

        let created_at = self.clock.now();
        let blob_pointer = catalog::turn_blob_path(&run.run_id, turn_index);
        let turn = TurnRecord {
            run_id: run.run_id.clone(),
            turn_index,
            student_text,
            ai_text: response.text,
            input_token_count: response.input_tokens,
            output_token_count: response.output_tokens,
            latency_ms: response.latency_ms,
            created_at,
            blob_pointer: blob_pointer.clone(),
        };
        self.write_turn_artifact(&turn, &scenario.persona)?;

        match self.index.create(&catalog::encode_turn(&turn)?)? {
            CreateOutcome::Created => Ok(turn),
            CreateOutcome::AlreadyExists => {
                // A redelivered sibling won the write; its copy is
                // authoritative, so realign the blob artifact with it.
                let record =
                    self.index.get(&catalog::turn_key(&run.run_id, turn_index))?.ok_or_else(
                        || IndexError::Corrupt(format!("turn {}/{turn_index}", run.run_id)),
                    )?;
                let persisted = catalog::decode_turn(&record)?;
                self.write_turn_artifact(&persisted, &scenario.persona)?;
                Ok(persisted)
            }
        }
    }

    /// Writes the blob-tier turn artifact.
    fn write_turn_artifact(&self, turn: &TurnRecord, persona: &str) -> Result<(), RunnerError> {
        let artifact = TurnArtifact {
            run_id: turn.run_id.clone(),
            turn_index: turn.turn_index,
            persona: persona.to_string(),
            student: turn.student_text.clone(),
            ai: turn.ai_text.clone(),
            input_tokens: turn.input_token_count,
            output_tokens: turn.output_token_count,
            latency_ms: turn.latency_ms,
            created_at: turn.created_at,
        };
        let bytes = canonical_json_bytes(&artifact)?;
        self.blobs.put(&turn.blob_pointer, &bytes)?;
        Ok(())
    }

    /// Best-effort terminal failure marker; errors here are swallowed so the
    /// original failure propagates to the queue.
    fn mark_failed(&self, run: &RunRecord, err: &RunnerError) {
        let message = err.to_string();
        let _ = access::update_run(self.index.as_ref(), &run.run_id, self.clock.now(), |record| {
            if record.status == RunStatus::Completed {
                return false;
            }
            record.status = RunStatus::Failed;
            record.error = Some(message.clone());
            true
        });
    }
}
