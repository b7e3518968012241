// crates/socratic-bench-pipeline/src/host.rs
// ============================================================================
// Module: Pipeline Host
// Description: Substrate wiring and worker lifecycle for one host process.
// Purpose: Assemble stores, queues, components, and worker pools from config.
// Dependencies: socratic-bench-{core,store-sqlite,blob-fs,queue,providers}, toml
// ============================================================================

//! ## Overview
//! The host owns the concrete substrates (SQLite index, filesystem blobs,
//! in-process queues and bus) and wires the four pipeline components over
//! them. Host configuration is TOML with serde defaults, so an empty file
//! yields a working local deployment. Worker pools are started explicitly
//! and stopped through their returned handle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use socratic_bench_blob_fs::FsBlobStore;
use socratic_bench_core::BlobError;
use socratic_bench_core::BlobStore;
use socratic_bench_core::Clock;
use socratic_bench_core::Delivery;
use socratic_bench_core::IndexError;
use socratic_bench_core::IndexStore;
use socratic_bench_core::InvokerError;
use socratic_bench_core::JobQueue;
use socratic_bench_core::JudgeJob;
use socratic_bench_core::ModelInvoker;
use socratic_bench_core::RunId;
use socratic_bench_core::RunJob;
use socratic_bench_core::RunJudgedSignal;
use socratic_bench_core::ScenarioDescriptor;
use socratic_bench_core::ScenarioError;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::StudentStrategy;
use socratic_bench_core::SystemClock;
use socratic_bench_core::runtime::Curator;
use socratic_bench_core::runtime::Judge;
use socratic_bench_core::runtime::JudgeConfig;
use socratic_bench_core::runtime::PlanOutcome;
use socratic_bench_core::runtime::PlanTrigger;
use socratic_bench_core::runtime::Planner;
use socratic_bench_core::runtime::PlannerError;
use socratic_bench_core::runtime::Runner;
use socratic_bench_core::runtime::RunnerConfig;
use socratic_bench_core::telemetry::AtomicMetrics;
use socratic_bench_core::telemetry::Component;
use socratic_bench_core::telemetry::MetricsRecorder;
use socratic_bench_core::telemetry::MetricsSnapshot;
use socratic_bench_providers::HttpInvoker;
use socratic_bench_providers::HttpInvokerConfig;
use socratic_bench_providers::InvokerAccessPolicy;
use socratic_bench_providers::InvokerRegistry;
use socratic_bench_providers::ScriptedInvoker;
use socratic_bench_providers::ScriptedResponse;
use socratic_bench_providers::ScriptedStudent;
use socratic_bench_providers::StaticScenarioRegistry;
use socratic_bench_providers::load_scenarios_json;
use socratic_bench_queue::MemoryJobQueue;
use socratic_bench_queue::MemorySignalBus;
use socratic_bench_queue::QueueConfig;
use socratic_bench_store_sqlite::SqliteIndexStore;
use socratic_bench_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

use crate::harness::HandlerFailure;
use crate::harness::JobHandler;
use crate::harness::WorkerPool;
use crate::harness::WorkerPoolConfig;
use crate::inspect::RunInspection;
use crate::inspect::inspect_run;

// ============================================================================
// SECTION: Host Configuration
// ============================================================================

/// Queue settings in host configuration.
///
/// # Invariants
/// - `visibility_timeout_secs` must exceed the expected handler duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct QueueSettings {
    /// Visibility timeout in seconds.
    pub visibility_timeout_secs: u64,
    /// Maximum deliveries before dead-letter diversion.
    pub max_receives: u32,
}

impl QueueSettings {
    /// Converts to the queue crate configuration.
    #[must_use]
    pub const fn to_queue_config(self) -> QueueConfig {
        QueueConfig {
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
            max_receives: self.max_receives,
        }
    }
}

/// Returns the dialogue queue defaults (minutes-scale runs).
const fn default_dialogue_queue() -> QueueSettings {
    QueueSettings {
        visibility_timeout_secs: 300,
        max_receives: 5,
    }
}

/// Returns the judgment queue defaults (seconds-scale judgments).
const fn default_judgment_queue() -> QueueSettings {
    QueueSettings {
        visibility_timeout_secs: 60,
        max_receives: 5,
    }
}

/// Returns the signal queue defaults.
const fn default_signal_queue() -> QueueSettings {
    QueueSettings {
        visibility_timeout_secs: 60,
        max_receives: 5,
    }
}

/// Model invoker selection.
///
/// # Invariants
/// - Variants are stable for configuration parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokerMode {
    /// Deterministic scripted invoker (local development).
    #[default]
    Scripted,
    /// Blocking HTTP invoker for OpenAI-compatible endpoints.
    Http,
}

/// Invoker settings in host configuration.
///
/// # Invariants
/// - `endpoint` is required when `mode` is `http`.
/// - `denied_models` overrides `allowed_models` when both are present; an
///   absent `allowed_models` permits every model not denied.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
pub struct InvokerSettings {
    /// Invoker selection.
    #[serde(default)]
    pub mode: InvokerMode,
    /// Chat-completions endpoint URL (HTTP mode).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token (HTTP mode).
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Optional allowlist of model identifiers.
    #[serde(default)]
    pub allowed_models: Option<BTreeSet<String>>,
    /// Explicit denylist of model identifiers.
    #[serde(default)]
    pub denied_models: BTreeSet<String>,
}

impl InvokerSettings {
    /// Converts the policy fields into the registry access policy.
    #[must_use]
    pub fn access_policy(&self) -> InvokerAccessPolicy {
        InvokerAccessPolicy {
            allowlist: self.allowed_models.clone(),
            denylist: self.denied_models.clone(),
        }
    }
}

/// Host configuration loaded from TOML.
///
/// # Invariants
/// - Every field has a default; an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Data directory holding the index database and blob root.
    pub data_dir: PathBuf,
    /// Optional scenario descriptor file (JSON array).
    pub scenario_file: Option<PathBuf>,
    /// Runner worker cap.
    pub runner_concurrency: usize,
    /// Judge worker cap.
    pub judge_concurrency: usize,
    /// Curator worker cap.
    pub curator_concurrency: usize,
    /// Planner trigger interval in seconds (serve mode), if periodic.
    pub planner_interval_secs: Option<u64>,
    /// Dialogue queue settings.
    pub dialogue_queue: QueueSettings,
    /// Judgment queue settings.
    pub judgment_queue: QueueSettings,
    /// Signal queue settings.
    pub signal_queue: QueueSettings,
    /// Invoker settings.
    pub invoker: InvokerSettings,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("socratic-bench-data"),
            scenario_file: None,
            runner_concurrency: 25,
            judge_concurrency: 10,
            curator_concurrency: 2,
            planner_interval_secs: None,
            dialogue_queue: default_dialogue_queue(),
            judgment_queue: default_judgment_queue(),
            signal_queue: default_signal_queue(),
            invoker: InvokerSettings::default(),
        }
    }
}

impl HostConfig {
    /// Parses a TOML document into a host configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] when the document is malformed.
    pub fn from_toml(text: &str) -> Result<Self, HostError> {
        toml::from_str(text).map_err(|err| HostError::Config(err.to_string()))
    }

    /// Loads a configuration file, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] when the file exists but cannot be read
    /// or parsed.
    pub fn load(path: Option<&PathBuf>) -> Result<Self, HostError> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|err| HostError::Config(format!("{}: {err}", path.display())))?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }
}

// ============================================================================
// SECTION: Host Errors
// ============================================================================

/// Host assembly errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HostError {
    /// Configuration load or parse failure.
    #[error("host configuration error: {0}")]
    Config(String),
    /// Index tier failure.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Blob tier failure.
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// Scenario registry failure.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Typed index access failure.
    #[error(transparent)]
    Access(#[from] socratic_bench_core::runtime::AccessError),
    /// Invoker construction failure.
    #[error(transparent)]
    Invoker(#[from] InvokerError),
}

// ============================================================================
// SECTION: Demo Scenarios
// ============================================================================

/// Built-in scenarios used when no scenario file is configured.
fn demo_scenarios() -> Vec<ScenarioDescriptor> {
    vec![
        ScenarioDescriptor {
            scenario_id: ScenarioId::new("fractions-intro"),
            persona: "A curious middle-school student meeting fractions for the first time."
                .to_string(),
            opening_utterance: "Why is one half the same as two quarters?".to_string(),
            turn_count_target: 1,
            rubric_tag: "socratic-core".to_string(),
        },
        ScenarioDescriptor {
            scenario_id: ScenarioId::new("photosynthesis-depth"),
            persona: "A high-school student who memorized the photosynthesis equation but \
                      cannot explain it."
                .to_string(),
            opening_utterance: "Plants make food from sunlight, right? That's all I know."
                .to_string(),
            turn_count_target: 3,
            rubric_tag: "socratic-core".to_string(),
        },
    ]
}

// ============================================================================
// SECTION: Handler Adapters
// ============================================================================

/// Adapter running the core runner under the worker harness.
struct RunnerHandler {
    /// Wrapped component.
    runner: Runner,
}

impl JobHandler<RunJob> for RunnerHandler {
    fn component(&self) -> Component {
        Component::Runner
    }

    fn handle(&self, delivery: &Delivery<RunJob>) -> Result<(), HandlerFailure> {
        self.runner.handle(&delivery.payload).map_err(|err| {
            if err.is_transient() {
                HandlerFailure::transient(err.to_string())
            } else {
                HandlerFailure::permanent(err.to_string())
            }
        })
    }
}

/// Adapter running the core judge under the worker harness.
struct JudgeHandler {
    /// Wrapped component.
    judge: Judge,
}

impl JobHandler<JudgeJob> for JudgeHandler {
    fn component(&self) -> Component {
        Component::Judge
    }

    fn handle(&self, delivery: &Delivery<JudgeJob>) -> Result<(), HandlerFailure> {
        self.judge.handle(&delivery.payload).map_err(|err| {
            if err.is_transient() {
                HandlerFailure::transient(err.to_string())
            } else {
                HandlerFailure::permanent(err.to_string())
            }
        })
    }
}

/// Adapter running the core curator under the worker harness.
struct CuratorHandler {
    /// Wrapped component.
    curator: Curator,
}

impl JobHandler<RunJudgedSignal> for CuratorHandler {
    fn component(&self) -> Component {
        Component::Curator
    }

    fn handle(&self, delivery: &Delivery<RunJudgedSignal>) -> Result<(), HandlerFailure> {
        match self.curator.handle(&delivery.payload) {
            Ok(_outcome) => Ok(()),
            Err(err) if err.is_transient() => Err(HandlerFailure::transient(err.to_string())),
            Err(err) => Err(HandlerFailure::permanent(err.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Worker Set
// ============================================================================

/// Running worker pools for one host.
///
/// # Invariants
/// - Pools stop in reverse dependency order on shutdown.
pub struct WorkerSet {
    /// Runner pool.
    runner_pool: WorkerPool,
    /// Judge pool.
    judge_pool: WorkerPool,
    /// Curator pool.
    curator_pool: WorkerPool,
}

impl WorkerSet {
    /// Stops all pools and joins their threads.
    pub fn shutdown(self) {
        self.runner_pool.shutdown();
        self.judge_pool.shutdown();
        self.curator_pool.shutdown();
    }
}

// ============================================================================
// SECTION: Pipeline Host
// ============================================================================

/// One host process's assembled pipeline.
///
/// # Invariants
/// - All components share the same store, queue, and clock instances.
pub struct PipelineHost {
    /// Host configuration.
    config: HostConfig,
    /// Index tier.
    index: Arc<dyn IndexStore>,
    /// Blob tier.
    blobs: Arc<dyn BlobStore>,
    /// Dialogue queue.
    dialogue_queue: Arc<MemoryJobQueue<RunJob>>,
    /// Judgment queue.
    judgment_queue: Arc<MemoryJobQueue<JudgeJob>>,
    /// Curator's signal subscription queue.
    signal_queue: Arc<MemoryJobQueue<RunJudgedSignal>>,
    /// Completion signal bus.
    bus: Arc<MemorySignalBus>,
    /// Scenario registry.
    scenarios: Arc<StaticScenarioRegistry>,
    /// Model invoker shared by runner and judge.
    invoker: Arc<dyn ModelInvoker>,
    /// Student strategy.
    student: Arc<dyn StudentStrategy>,
    /// Host clock.
    clock: Arc<dyn Clock>,
    /// Metrics recorder.
    metrics: Arc<AtomicMetrics>,
}

impl PipelineHost {
    /// Assembles a host from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when a substrate cannot be constructed.
    pub fn build(config: HostConfig) -> Result<Self, HostError> {
        fs::create_dir_all(&config.data_dir).map_err(|err| {
            HostError::Config(format!("create {}: {err}", config.data_dir.display()))
        })?;
        let index: Arc<dyn IndexStore> = Arc::new(SqliteIndexStore::open(
            &SqliteStoreConfig::new(config.data_dir.join("index.sqlite")),
        )?);
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::open(config.data_dir.join("blobs"))?);

        let dialogue_queue =
            Arc::new(MemoryJobQueue::new(config.dialogue_queue.to_queue_config()));
        let judgment_queue =
            Arc::new(MemoryJobQueue::new(config.judgment_queue.to_queue_config()));
        let bus = Arc::new(MemorySignalBus::new(config.signal_queue.to_queue_config()));
        let signal_queue = bus
            .subscribe()
            .map_err(|err| HostError::Config(format!("signal subscription: {err}")))?;

        let scenarios = Arc::new(match &config.scenario_file {
            Some(path) => {
                let bytes = fs::read(path)
                    .map_err(|err| HostError::Config(format!("{}: {err}", path.display())))?;
                load_scenarios_json(&bytes)?
            }
            None => StaticScenarioRegistry::new(demo_scenarios()),
        });

        let invoker = build_invoker(&config.invoker)?;
        let student: Arc<dyn StudentStrategy> = Arc::new(ScriptedStudent::with_default_probes());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let metrics = Arc::new(AtomicMetrics::new());

        Ok(Self {
            config,
            index,
            blobs,
            dialogue_queue,
            judgment_queue,
            signal_queue,
            bus,
            scenarios,
            invoker,
            student,
            clock,
            metrics,
        })
    }

    /// Triggers the planner once.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError`] when the trigger fails before enqueueing.
    pub fn plan(&self, force: bool) -> Result<PlanOutcome, PlannerError> {
        let planner = Planner::new(
            Arc::clone(&self.index),
            Arc::clone(&self.blobs),
            self.dialogue_queue.clone(),
            Arc::clone(&self.clock),
            self.metrics.clone(),
        );
        planner.plan(&PlanTrigger {
            force,
        })
    }

    /// Starts the worker pools.
    #[must_use]
    pub fn start_workers(&self) -> WorkerSet {
        let metrics: Arc<dyn MetricsRecorder> = self.metrics.clone();

        let runner = Runner::new(
            Arc::clone(&self.index),
            Arc::clone(&self.blobs),
            self.scenarios.clone(),
            Arc::clone(&self.invoker),
            Arc::clone(&self.student),
            self.judgment_queue.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&metrics),
            RunnerConfig::default(),
        );
        let judge = Judge::new(
            Arc::clone(&self.index),
            Arc::clone(&self.blobs),
            Arc::clone(&self.invoker),
            self.bus.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&metrics),
            JudgeConfig::default(),
        );
        let curator = Curator::new(
            Arc::clone(&self.index),
            Arc::clone(&self.blobs),
            Arc::clone(&metrics),
        );

        let runner_pool = WorkerPool::spawn(
            WorkerPoolConfig::new(
                "runner",
                self.config.runner_concurrency,
                self.config.dialogue_queue.max_receives,
            ),
            self.dialogue_queue.clone(),
            Arc::new(RunnerHandler {
                runner,
            }),
            Arc::clone(&metrics),
        );
        let judge_pool = WorkerPool::spawn(
            WorkerPoolConfig::new(
                "judge",
                self.config.judge_concurrency,
                self.config.judgment_queue.max_receives,
            ),
            self.judgment_queue.clone(),
            Arc::new(JudgeHandler {
                judge,
            }),
            Arc::clone(&metrics),
        );
        let curator_pool = WorkerPool::spawn(
            WorkerPoolConfig::new(
                "curator",
                self.config.curator_concurrency,
                self.config.signal_queue.max_receives,
            ),
            self.signal_queue.clone(),
            Arc::new(CuratorHandler {
                curator,
            }),
            Arc::clone(&metrics),
        );

        WorkerSet {
            runner_pool,
            judge_pool,
            curator_pool,
        }
    }

    /// Returns the configured planner interval for serve mode.
    #[must_use]
    pub fn planner_interval(&self) -> Option<Duration> {
        self.config.planner_interval_secs.map(Duration::from_secs)
    }

    /// Returns the index tier handle.
    #[must_use]
    pub fn index(&self) -> Arc<dyn IndexStore> {
        Arc::clone(&self.index)
    }

    /// Returns a point-in-time metrics snapshot.
    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns the dialogue and judgment queue depths (ready, dead-letter).
    #[must_use]
    pub fn queue_depths(&self) -> QueueDepths {
        QueueDepths {
            dialogue_ready: self.dialogue_queue.depth().unwrap_or(0),
            dialogue_dead: self.dialogue_queue.dead_letter_depth().unwrap_or(0),
            judgment_ready: self.judgment_queue.depth().unwrap_or(0),
            judgment_dead: self.judgment_queue.dead_letter_depth().unwrap_or(0),
        }
    }

    /// Inspects one run (read-only composition of index queries).
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] on index failures.
    pub fn inspect_run(&self, run_id: &RunId) -> Result<Option<RunInspection>, HostError> {
        Ok(inspect_run(self.index.as_ref(), run_id)?)
    }
}

/// Ready and dead-letter depths for the host's queues.
///
/// # Invariants
/// - Values are point-in-time reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueDepths {
    /// Dialogue queue messages awaiting delivery.
    pub dialogue_ready: u64,
    /// Dialogue queue dead letters.
    pub dialogue_dead: u64,
    /// Judgment queue messages awaiting delivery.
    pub judgment_ready: u64,
    /// Judgment queue dead letters.
    pub judgment_dead: u64,
}

/// Builds the configured model invoker behind the policy-gated registry.
fn build_invoker(settings: &InvokerSettings) -> Result<Arc<dyn ModelInvoker>, HostError> {
    let backend: Arc<dyn ModelInvoker> = match settings.mode {
        InvokerMode::Scripted => {
            let invoker = ScriptedInvoker::fixed(ScriptedResponse::new(
                "That is a good start. What happens if you test it on a simple case?",
                50,
                18,
                40,
            ));
            Arc::new(invoker)
        }
        InvokerMode::Http => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                HostError::Config("invoker.endpoint is required in http mode".to_string())
            })?;
            let api_key = settings
                .api_key_env
                .as_ref()
                .and_then(|variable| std::env::var(variable).ok());
            let invoker = HttpInvoker::new(HttpInvokerConfig {
                endpoint,
                api_key,
                connect_timeout_ms: 5_000,
                user_agent: "socratic-bench/0.1".to_string(),
            })?;
            Arc::new(invoker)
        }
    };
    let registry = InvokerRegistry::builder()
        .default_invoker(backend)
        .policy(settings.access_policy())
        .build();
    Ok(Arc::new(registry))
}
