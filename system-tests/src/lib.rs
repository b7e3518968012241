// system-tests/src/lib.rs
// ============================================================================
// Module: System Test World
// Description: Fully wired in-memory pipeline for end-to-end tests.
// Purpose: Drive planner, runner, judge, and curator deterministically.
// Dependencies: socratic-bench-{core,store-sqlite,blob-fs,queue,providers}
// ============================================================================

//! ## Overview
//! The world wires the four pipeline components over an in-memory SQLite
//! index, an in-memory blob store, and the in-process queues and bus. Tests
//! drive deliveries explicitly (including duplicate deliveries) so every
//! idempotency and recovery path of the pipeline can be exercised without
//! timing dependence. The scripted invoker and a manual clock keep outputs
//! deterministic.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test harness code is permitted panic-based assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use socratic_bench_blob_fs::MemoryBlobStore;
use socratic_bench_core::BenchmarkConfig;
use socratic_bench_core::BlobStore;
use socratic_bench_core::Delivery;
use socratic_bench_core::GlobalParameters;
use socratic_bench_core::IndexStore;
use socratic_bench_core::JobQueue;
use socratic_bench_core::JudgeJob;
use socratic_bench_core::JudgmentRecord;
use socratic_bench_core::ManualClock;
use socratic_bench_core::ModelDescriptor;
use socratic_bench_core::ModelId;
use socratic_bench_core::PeriodAggregate;
use socratic_bench_core::PeriodKey;
use socratic_bench_core::RubricVersion;
use socratic_bench_core::RunId;
use socratic_bench_core::RunJob;
use socratic_bench_core::RunJudgedSignal;
use socratic_bench_core::RunRecord;
use socratic_bench_core::RunSummary;
use socratic_bench_core::ScenarioDescriptor;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::Timestamp;
use socratic_bench_core::TurnRecord;
use socratic_bench_core::catalog;
use socratic_bench_core::runtime::CurationOutcome;
use socratic_bench_core::runtime::Curator;
use socratic_bench_core::runtime::CuratorError;
use socratic_bench_core::runtime::Judge;
use socratic_bench_core::runtime::JudgeConfig;
use socratic_bench_core::runtime::JudgeError;
use socratic_bench_core::runtime::PlanOutcome;
use socratic_bench_core::runtime::PlanTrigger;
use socratic_bench_core::runtime::Planner;
use socratic_bench_core::runtime::RetryPolicy;
use socratic_bench_core::runtime::Runner;
use socratic_bench_core::runtime::RunnerConfig;
use socratic_bench_core::runtime::RunnerError;
use socratic_bench_core::telemetry::AtomicMetrics;
use socratic_bench_core::telemetry::MetricsSnapshot;
use socratic_bench_providers::ScriptedInvoker;
use socratic_bench_providers::ScriptedResponse;
use socratic_bench_providers::ScriptedStudent;
use socratic_bench_providers::StaticScenarioRegistry;
use socratic_bench_queue::MemoryJobQueue;
use socratic_bench_queue::MemorySignalBus;
use socratic_bench_queue::QueueConfig;
use socratic_bench_store_sqlite::SqliteIndexStore;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Candidate model identifier used across the system tests.
pub const MODEL: &str = "tutor-small";

/// Judge model identifier used across the system tests.
pub const JUDGE_MODEL: &str = "judge-large";

/// Scenario identifier used across the system tests.
pub const SCENARIO: &str = "fractions-intro";

/// Fixed wall-clock start for deterministic period keys (2023-W46).
pub const EPOCH_MS: i64 = 1_700_000_000_000;

/// Builds the single-model, single-scenario configuration used by most
/// system tests.
#[must_use]
pub fn single_model_config(turn_cap: u32) -> BenchmarkConfig {
    BenchmarkConfig {
        models: vec![ModelDescriptor {
            model_id: ModelId::new(MODEL),
            parameters: BTreeMap::new(),
        }],
        scenarios: vec![ScenarioId::new(SCENARIO)],
        rubric_version: RubricVersion::new("socratic-v1"),
        parameters: GlobalParameters {
            turn_cap,
            judge_model_id: ModelId::new(JUDGE_MODEL),
            temperature: None,
            judge_temperature: None,
            seed: None,
            extra: BTreeMap::new(),
        },
    }
}

/// Builds the default scenario descriptor with the given turn target.
#[must_use]
pub fn scenario_with_target(turn_count_target: u32) -> ScenarioDescriptor {
    ScenarioDescriptor {
        scenario_id: ScenarioId::new(SCENARIO),
        persona: "A curious middle-school student meeting fractions for the first time."
            .to_string(),
        opening_utterance: "Why is one half the same as two quarters?".to_string(),
        turn_count_target,
        rubric_tag: "socratic-core".to_string(),
    }
}

// ============================================================================
// SECTION: World
// ============================================================================

/// Fully wired in-memory pipeline.
pub struct World {
    /// Index tier (in-memory SQLite).
    pub index: Arc<dyn IndexStore>,
    /// Blob tier (in-memory).
    pub blobs: Arc<MemoryBlobStore>,
    /// Dialogue queue.
    pub dialogue_queue: Arc<MemoryJobQueue<RunJob>>,
    /// Judgment queue.
    pub judgment_queue: Arc<MemoryJobQueue<JudgeJob>>,
    /// Curator's signal subscription.
    pub signal_queue: Arc<MemoryJobQueue<RunJudgedSignal>>,
    /// Scripted model invoker.
    pub invoker: Arc<ScriptedInvoker>,
    /// Manual clock.
    pub clock: Arc<ManualClock>,
    /// Metrics recorder.
    pub metrics: Arc<AtomicMetrics>,
    /// Planner component.
    planner: Planner,
    /// Runner component.
    runner: Runner,
    /// Judge component.
    judge: Judge,
    /// Curator component.
    curator: Curator,
}

impl World {
    /// Builds a world serving the given scenarios.
    #[must_use]
    pub fn new(scenarios: Vec<ScenarioDescriptor>) -> Self {
        let index: Arc<dyn IndexStore> =
            Arc::new(SqliteIndexStore::open_in_memory().expect("in-memory index"));
        let blobs = Arc::new(MemoryBlobStore::new());
        let queue_config = QueueConfig {
            visibility_timeout: Duration::from_millis(50),
            max_receives: 5,
        };
        let dialogue_queue = Arc::new(MemoryJobQueue::new(queue_config));
        let judgment_queue = Arc::new(MemoryJobQueue::new(queue_config));
        let bus = Arc::new(MemorySignalBus::new(queue_config));
        let signal_queue = bus.subscribe().expect("signal subscription");

        let invoker = Arc::new(ScriptedInvoker::fixed(ScriptedResponse::new(
            "What do you think?",
            50,
            5,
            100,
        )));
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_millis(EPOCH_MS)));
        let metrics = Arc::new(AtomicMetrics::new());
        let registry = Arc::new(StaticScenarioRegistry::new(scenarios));

        let runner_config = RunnerConfig {
            invoke_deadline: Duration::from_secs(5),
            retry: RetryPolicy::no_retries(),
            max_output_tokens: Some(256),
        };
        let judge_config = JudgeConfig {
            judge_deadline: Duration::from_secs(5),
            retry: RetryPolicy::no_retries(),
        };

        let planner = Planner::new(
            Arc::clone(&index),
            blobs.clone(),
            dialogue_queue.clone(),
            clock.clone(),
            metrics.clone(),
        );
        let runner = Runner::new(
            Arc::clone(&index),
            blobs.clone(),
            registry.clone(),
            invoker.clone(),
            Arc::new(ScriptedStudent::with_default_probes()),
            judgment_queue.clone(),
            clock.clone(),
            metrics.clone(),
            runner_config,
        );
        let judge = Judge::new(
            Arc::clone(&index),
            blobs.clone(),
            invoker.clone(),
            bus,
            clock.clone(),
            metrics.clone(),
            judge_config,
        );
        let curator = Curator::new(Arc::clone(&index), blobs.clone(), metrics.clone());

        Self {
            index,
            blobs,
            dialogue_queue,
            judgment_queue,
            signal_queue,
            invoker,
            clock,
            metrics,
            planner,
            runner,
            judge,
            curator,
        }
    }

    // ------------------------------------------------------------------
    // Configuration and planning
    // ------------------------------------------------------------------

    /// Writes the active configuration to its well-known blob path.
    pub fn put_active_config(&self, config: &BenchmarkConfig) {
        let bytes = serde_json::to_vec(config).expect("config bytes");
        self.blobs.put(catalog::ACTIVE_CONFIG_PATH, &bytes).expect("config put");
    }

    /// Triggers the planner once.
    #[must_use]
    pub fn plan(&self, force: bool) -> PlanOutcome {
        self.planner
            .plan(&PlanTrigger {
                force,
            })
            .expect("planner trigger")
    }

    // ------------------------------------------------------------------
    // Explicit deliveries
    // ------------------------------------------------------------------

    /// Delivers one dialogue job to the runner (handler call, not queue).
    ///
    /// # Errors
    ///
    /// Propagates the runner's handler error.
    pub fn deliver_run_job(&self, job: &RunJob) -> Result<(), RunnerError> {
        self.runner.handle(job)
    }

    /// Delivers one judge job to the judge (handler call, not queue).
    ///
    /// # Errors
    ///
    /// Propagates the judge's handler error.
    pub fn deliver_judge_job(&self, job: &JudgeJob) -> Result<(), JudgeError> {
        self.judge.handle(job)
    }

    /// Delivers one signal to the curator (handler call, not queue).
    ///
    /// # Errors
    ///
    /// Propagates the curator's handler error.
    pub fn deliver_signal(&self, signal: &RunJudgedSignal) -> Result<CurationOutcome, CuratorError> {
        self.curator.handle(signal)
    }

    /// Receives the next dialogue job without handling it.
    #[must_use]
    pub fn next_run_job(&self) -> Option<Delivery<RunJob>> {
        self.dialogue_queue.receive(Duration::from_millis(10)).expect("dialogue receive")
    }

    // ------------------------------------------------------------------
    // Queue draining
    // ------------------------------------------------------------------

    /// Drains all three queues until the pipeline is quiescent.
    ///
    /// Handler failures leave the message for redelivery; the final pass
    /// waits out the visibility window so in-flight failures are reclaimed
    /// and retried the way the production harness would retry them.
    pub fn drain(&self) {
        let quick = Duration::from_millis(5);
        // Longer than the world's visibility timeout so receive() reclaims
        // expired deliveries before concluding a queue is empty.
        let settle = Duration::from_millis(120);
        loop {
            let mut progressed = false;
            for wait in [quick, settle] {
                while let Some(delivery) =
                    self.dialogue_queue.receive(wait).expect("dialogue receive")
                {
                    progressed = true;
                    if self.runner.handle(&delivery.payload).is_ok() {
                        self.dialogue_queue.ack(delivery.receipt).expect("dialogue ack");
                    }
                }
                while let Some(delivery) =
                    self.judgment_queue.receive(wait).expect("judgment receive")
                {
                    progressed = true;
                    if self.judge.handle(&delivery.payload).is_ok() {
                        self.judgment_queue.ack(delivery.receipt).expect("judgment ack");
                    }
                }
                while let Some(delivery) =
                    self.signal_queue.receive(wait).expect("signal receive")
                {
                    progressed = true;
                    if self.curator.handle(&delivery.payload).is_ok() {
                        self.signal_queue.ack(delivery.receipt).expect("signal ack");
                    }
                }
                if progressed {
                    break;
                }
            }
            if !progressed {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Typed reads
    // ------------------------------------------------------------------

    /// Loads run metadata.
    #[must_use]
    pub fn run(&self, run_id: &RunId) -> Option<RunRecord> {
        self.index
            .get(&catalog::run_key(run_id))
            .expect("run get")
            .map(|record| catalog::decode_run(&record).expect("run decode"))
    }

    /// Lists run metadata for a model via the secondary index.
    #[must_use]
    pub fn runs_for_model(&self, model_id: &ModelId) -> Vec<RunRecord> {
        self.index
            .query_runs_by_model(model_id.as_str())
            .expect("runs by model")
            .iter()
            .map(|record| catalog::decode_run(record).expect("run decode"))
            .collect()
    }

    /// Loads all turns of a run in order.
    #[must_use]
    pub fn turns(&self, run_id: &RunId) -> Vec<TurnRecord> {
        self.index
            .query_partition(&catalog::run_partition(run_id), catalog::TURN_SORT_PREFIX)
            .expect("turns query")
            .iter()
            .map(|record| catalog::decode_turn(record).expect("turn decode"))
            .collect()
    }

    /// Loads all judgments of a run in order.
    #[must_use]
    pub fn judgments(&self, run_id: &RunId) -> Vec<JudgmentRecord> {
        self.index
            .query_partition(&catalog::run_partition(run_id), catalog::JUDGE_SORT_PREFIX)
            .expect("judgments query")
            .iter()
            .map(|record| catalog::decode_judgment(record).expect("judgment decode"))
            .collect()
    }

    /// Loads the run summary when curation has landed.
    #[must_use]
    pub fn summary(&self, run_id: &RunId) -> Option<RunSummary> {
        self.index
            .get(&catalog::summary_key(run_id))
            .expect("summary get")
            .map(|record| catalog::decode_summary(&record).expect("summary decode"))
    }

    /// Loads the period aggregate for a (period, model) pair.
    #[must_use]
    pub fn aggregate(&self, period_key: &PeriodKey, model_id: &ModelId) -> Option<PeriodAggregate> {
        self.index
            .get(&catalog::period_aggregate_key(period_key, model_id))
            .expect("aggregate get")
            .map(|record| catalog::decode_period_aggregate(&record).expect("aggregate decode"))
    }

    /// Reads the curated run artifact bytes.
    #[must_use]
    pub fn curated_run_bytes(&self, run_id: &RunId) -> Option<Vec<u8>> {
        self.blobs.get(&catalog::curated_run_path(run_id)).expect("curated get")
    }

    /// Returns the world's period key (derived from the manual clock epoch).
    #[must_use]
    pub fn period_key(&self) -> PeriodKey {
        Timestamp::from_unix_millis(EPOCH_MS).period_key().expect("period key")
    }

    /// Returns a point-in-time metrics snapshot.
    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
