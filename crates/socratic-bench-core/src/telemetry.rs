// crates/socratic-bench-core/src/telemetry.rs
// ============================================================================
// Module: Pipeline Telemetry
// Description: Observability hooks for worker handlers and queues.
// Purpose: Provide metric counters and latency buckets without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for pipeline counters and
//! invoker latency histograms. It is intentionally dependency-light so
//! downstream deployments can plug in Prometheus or OpenTelemetry without
//! redesign. Every failure mode the pipeline can take increments a counter
//! here; no user-visible failure is silent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency buckets in milliseconds for model invoker histograms.
pub const INVOKER_LATENCY_BUCKETS_MS: &[u64] =
    &[10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000, 60_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Pipeline component classification for metric labels.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Component {
    /// Planner trigger handler.
    Planner,
    /// Dialogue runner worker.
    Runner,
    /// Judgment worker.
    Judge,
    /// Curation worker.
    Curator,
}

impl Component {
    /// Returns a stable label for the component.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Runner => "runner",
            Self::Judge => "judge",
            Self::Curator => "curator",
        }
    }

    /// Returns the dense array index for the component.
    const fn index(self) -> usize {
        match self {
            Self::Planner => 0,
            Self::Runner => 1,
            Self::Judge => 2,
            Self::Curator => 3,
        }
    }
}

/// Number of component labels.
const COMPONENT_COUNT: usize = 4;

/// Handler outcome classification for metric labels.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerOutcome {
    /// Handler succeeded; the message was acknowledged.
    Ok,
    /// Handler failed on a transient class; the message will redeliver.
    TransientFailure,
    /// Handler failed on a permanent class; redelivery will exhaust to DLQ.
    PermanentFailure,
}

impl HandlerOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::TransientFailure => "transient_failure",
            Self::PermanentFailure => "permanent_failure",
        }
    }
}

// ============================================================================
// SECTION: Recorder Interface
// ============================================================================

/// Metrics recorder plugged in by hosts.
///
/// Implementations must be cheap and non-blocking; handlers call these on
/// every message.
pub trait MetricsRecorder: Send + Sync {
    /// Records messages enqueued by a component.
    fn record_enqueue(&self, component: Component, count: u64);

    /// Records a handler completion with its outcome and duration.
    fn record_handler(&self, component: Component, outcome: HandlerOutcome, duration: Duration);

    /// Records a message diverted to a dead-letter sink.
    fn record_dead_letter(&self, component: Component);

    /// Records a `run-judged` completion signal emission.
    fn record_completion_signal(&self);

    /// Records a successful curation.
    fn record_curation(&self);

    /// Records an invariant violation observed and skipped (eventual
    /// consistency not yet converged).
    fn record_invariant_skip(&self, component: Component);

    /// Records one model invocation latency.
    fn record_invoker_latency(&self, latency_ms: u64);

    /// Records an upstream throttle response.
    fn record_invoker_throttle(&self);
}

/// Recorder that drops all events.
///
/// # Invariants
/// - All methods are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record_enqueue(&self, _component: Component, _count: u64) {}

    fn record_handler(&self, _component: Component, _outcome: HandlerOutcome, _duration: Duration) {
    }

    fn record_dead_letter(&self, _component: Component) {}

    fn record_completion_signal(&self) {}

    fn record_curation(&self) {}

    fn record_invariant_skip(&self, _component: Component) {}

    fn record_invoker_latency(&self, _latency_ms: u64) {}

    fn record_invoker_throttle(&self) {}
}

// ============================================================================
// SECTION: Atomic Recorder
// ============================================================================

/// Per-component counter block.
///
/// # Invariants
/// - Counters only increase.
#[derive(Debug, Default)]
struct ComponentCounters {
    /// Messages enqueued.
    enqueues: AtomicU64,
    /// Handler successes.
    handler_ok: AtomicU64,
    /// Handler transient failures.
    handler_transient: AtomicU64,
    /// Handler permanent failures.
    handler_permanent: AtomicU64,
    /// Dead-letter diversions.
    dead_letters: AtomicU64,
    /// Invariant violations observed and skipped.
    invariant_skips: AtomicU64,
}

/// Process-local metrics recorder backed by atomics.
///
/// # Invariants
/// - Snapshot reads are monotonic but not mutually consistent across counters.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    /// Per-component counters, indexed by [`Component::index`].
    components: [ComponentCounters; COMPONENT_COUNT],
    /// Completion signal emissions.
    completion_signals: AtomicU64,
    /// Successful curations.
    curations: AtomicU64,
    /// Invoker latency histogram buckets (cumulative upper bounds).
    invoker_latency_buckets: [AtomicU64; INVOKER_LATENCY_BUCKETS_MS.len()],
    /// Invoker latency observations above the last bucket.
    invoker_latency_overflow: AtomicU64,
    /// Invoker throttle responses.
    invoker_throttles: AtomicU64,
}

/// Counter snapshot for one component.
///
/// # Invariants
/// - Values are point-in-time reads of monotonic counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSnapshot {
    /// Messages enqueued.
    pub enqueues: u64,
    /// Handler successes.
    pub handler_ok: u64,
    /// Handler transient failures.
    pub handler_transient: u64,
    /// Handler permanent failures.
    pub handler_permanent: u64,
    /// Dead-letter diversions.
    pub dead_letters: u64,
    /// Invariant violations observed and skipped.
    pub invariant_skips: u64,
}

/// Full metrics snapshot for diagnostics and tests.
///
/// # Invariants
/// - Values are point-in-time reads of monotonic counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Planner counters.
    pub planner: ComponentSnapshot,
    /// Runner counters.
    pub runner: ComponentSnapshot,
    /// Judge counters.
    pub judge: ComponentSnapshot,
    /// Curator counters.
    pub curator: ComponentSnapshot,
    /// Completion signal emissions.
    pub completion_signals: u64,
    /// Successful curations.
    pub curations: u64,
    /// Invoker latency histogram counts per bucket.
    pub invoker_latency_buckets: Vec<u64>,
    /// Invoker latency observations above the last bucket.
    pub invoker_latency_overflow: u64,
    /// Invoker throttle responses.
    pub invoker_throttles: u64,
}

impl AtomicMetrics {
    /// Creates a zeroed recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            planner: self.component_snapshot(Component::Planner),
            runner: self.component_snapshot(Component::Runner),
            judge: self.component_snapshot(Component::Judge),
            curator: self.component_snapshot(Component::Curator),
            completion_signals: self.completion_signals.load(Ordering::Relaxed),
            curations: self.curations.load(Ordering::Relaxed),
            invoker_latency_buckets: self
                .invoker_latency_buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            invoker_latency_overflow: self.invoker_latency_overflow.load(Ordering::Relaxed),
            invoker_throttles: self.invoker_throttles.load(Ordering::Relaxed),
        }
    }

    /// Reads one component's counters.
    fn component_snapshot(&self, component: Component) -> ComponentSnapshot {
        let counters = &self.components[component.index()];
        ComponentSnapshot {
            enqueues: counters.enqueues.load(Ordering::Relaxed),
            handler_ok: counters.handler_ok.load(Ordering::Relaxed),
            handler_transient: counters.handler_transient.load(Ordering::Relaxed),
            handler_permanent: counters.handler_permanent.load(Ordering::Relaxed),
            dead_letters: counters.dead_letters.load(Ordering::Relaxed),
            invariant_skips: counters.invariant_skips.load(Ordering::Relaxed),
        }
    }
}

impl MetricsRecorder for AtomicMetrics {
    fn record_enqueue(&self, component: Component, count: u64) {
        self.components[component.index()].enqueues.fetch_add(count, Ordering::Relaxed);
    }

    fn record_handler(&self, component: Component, outcome: HandlerOutcome, _duration: Duration) {
        let counters = &self.components[component.index()];
        match outcome {
            HandlerOutcome::Ok => counters.handler_ok.fetch_add(1, Ordering::Relaxed),
            HandlerOutcome::TransientFailure => {
                counters.handler_transient.fetch_add(1, Ordering::Relaxed)
            }
            HandlerOutcome::PermanentFailure => {
                counters.handler_permanent.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    fn record_dead_letter(&self, component: Component) {
        self.components[component.index()].dead_letters.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion_signal(&self) {
        self.completion_signals.fetch_add(1, Ordering::Relaxed);
    }

    fn record_curation(&self) {
        self.curations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invariant_skip(&self, component: Component) {
        self.components[component.index()].invariant_skips.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invoker_latency(&self, latency_ms: u64) {
        let position = INVOKER_LATENCY_BUCKETS_MS.iter().position(|bound| latency_ms <= *bound);
        match position {
            Some(index) => {
                self.invoker_latency_buckets[index].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.invoker_latency_overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn record_invoker_throttle(&self) {
        self.invoker_throttles.fetch_add(1, Ordering::Relaxed);
    }
}
