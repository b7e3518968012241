// crates/socratic-bench-core/src/interfaces/mod.rs
// ============================================================================
// Module: Socratic Bench Interfaces
// Description: Backend-agnostic interfaces for storage, queues, and invocation.
// Purpose: Define the contract surfaces used by the pipeline components.
// Dependencies: serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with its substrates without
//! embedding backend-specific details. Queues and the signal bus are the only
//! coupling between components; no component calls another synchronously.
//! All implementations must tolerate at-least-once delivery and duplicate
//! writes of identical content.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ManifestId;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ScenarioId;
use crate::core::records::TurnRecord;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Index Tier
// ============================================================================

/// Composite key for the index tier.
///
/// # Invariants
/// - `partition_key` and `sort_key` are opaque; layout lives in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    /// Partition key.
    pub partition_key: String,
    /// Sort key within the partition.
    pub sort_key: String,
}

impl IndexKey {
    /// Creates a composite key.
    #[must_use]
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

/// One record in the index tier.
///
/// # Invariants
/// - `payload` holds compact metadata; large payloads live in the blob tier
///   behind `blob_pointer`.
/// - `revision` starts at 1 on creation and increases by 1 per overwrite.
/// - `model_id` / `manifest_id` are secondary-index attributes, set only on
///   run metadata records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Composite key.
    pub key: IndexKey,
    /// JSON payload.
    pub payload: Value,
    /// Optional pointer into the blob tier.
    pub blob_pointer: Option<String>,
    /// Secondary-index attribute: owning model identifier.
    pub model_id: Option<String>,
    /// Secondary-index attribute: owning manifest identifier.
    pub manifest_id: Option<String>,
    /// Record revision for versioned conditional writes.
    pub revision: u64,
    /// Write timestamp.
    pub written_at: Timestamp,
}

/// Outcome of a conditional create.
///
/// # Invariants
/// - Variants are stable and exhaustive for create outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Record was created.
    Created,
    /// A record already exists under the key; nothing was written.
    AlreadyExists,
}

/// Outcome of a versioned conditional write.
///
/// # Invariants
/// - Variants are stable and exhaustive for compare-and-set outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Write was applied.
    Applied,
    /// The stored revision did not match the expectation; nothing was written.
    Conflict,
}

/// Index tier errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index I/O error.
    #[error("index io error: {0}")]
    Io(String),
    /// Index data is corrupted or fails integrity checks.
    #[error("index corruption: {0}")]
    Corrupt(String),
    /// Index data is invalid for the requested operation.
    #[error("index invalid data: {0}")]
    Invalid(String),
    /// Index backend reported an error.
    #[error("index store error: {0}")]
    Store(String),
}

/// Composite-key index store.
///
/// All query operations must be `O(log n)` in the relevant partition except
/// [`IndexStore::scan_sort_key`], whose full-scan cost is accepted for the
/// curator and external read paths.
pub trait IndexStore: Send + Sync {
    /// Fetches one record by key.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the lookup fails.
    fn get(&self, key: &IndexKey) -> Result<Option<IndexRecord>, IndexError>;

    /// Writes a record unconditionally (last write wins).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the write fails.
    fn put(&self, record: &IndexRecord) -> Result<(), IndexError>;

    /// Creates a record only when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the write fails.
    fn create(&self, record: &IndexRecord) -> Result<CreateOutcome, IndexError>;

    /// Writes a record only when the stored revision matches `expected_revision`.
    ///
    /// An expectation of zero means the key must be absent.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the write fails.
    fn put_versioned(
        &self,
        record: &IndexRecord,
        expected_revision: u64,
    ) -> Result<CasOutcome, IndexError>;

    /// Enumerates records in a partition whose sort key starts with `sort_prefix`,
    /// ordered by sort key.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the query fails.
    fn query_partition(
        &self,
        partition_key: &str,
        sort_prefix: &str,
    ) -> Result<Vec<IndexRecord>, IndexError>;

    /// Counts records in a partition whose sort key starts with `sort_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the query fails.
    fn count_partition(&self, partition_key: &str, sort_prefix: &str) -> Result<u64, IndexError>;

    /// Enumerates run metadata records for a model, ordered by run identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the query fails.
    fn query_runs_by_model(&self, model_id: &str) -> Result<Vec<IndexRecord>, IndexError>;

    /// Enumerates run metadata records for a manifest, ordered by run identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the query fails.
    fn query_runs_by_manifest(&self, manifest_id: &str) -> Result<Vec<IndexRecord>, IndexError>;

    /// Enumerates all records with the given sort key (full scan; accepted cost).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the scan fails.
    fn scan_sort_key(&self, sort_key: &str) -> Result<Vec<IndexRecord>, IndexError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Blob Tier
// ============================================================================

/// Blob tier errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Blob I/O error.
    #[error("blob io error: {0}")]
    Io(String),
    /// Blob path is malformed or escapes the store root.
    #[error("blob invalid path: {0}")]
    InvalidPath(String),
}

/// Append-only, path-addressed blob store.
///
/// Writes must be atomic per object: readers never observe partial objects.
/// Duplicate writes of identical content are permitted and idempotent.
pub trait BlobStore: Send + Sync {
    /// Writes an object atomically at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the write fails.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError>;

    /// Reads an object, returning `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the read fails.
    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Returns true when an object exists at the path.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the check fails.
    fn exists(&self, path: &str) -> Result<bool, BlobError>;

    /// Lists object paths under a prefix, in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the listing fails.
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
}

// ============================================================================
// SECTION: Queue Payloads
// ============================================================================

/// Dialogue-queue job: drive one run to completion.
///
/// # Invariants
/// - Identifiers refer to the same planned run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    /// Run identifier.
    pub run_id: RunId,
    /// Manifest that planned the run.
    pub manifest_id: ManifestId,
    /// Candidate model identifier.
    pub model_id: ModelId,
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
}

/// Judgment-queue job: score one persisted turn.
///
/// # Invariants
/// - `turn_index` refers to a turn of `run_id` that is persisted or about to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeJob {
    /// Run identifier.
    pub run_id: RunId,
    /// Turn index to judge.
    pub turn_index: u32,
}

/// Signal emitted when all turns of a run have judgments.
///
/// # Invariants
/// - Delivery is at-least-once; consumers must tolerate duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJudgedSignal {
    /// Run identifier.
    pub run_id: RunId,
    /// Operational override: curate judged turns even when counts mismatch.
    #[serde(default)]
    pub force: bool,
}

// ============================================================================
// SECTION: Job Queues
// ============================================================================

/// Opaque receipt for an in-flight delivery.
///
/// # Invariants
/// - Valid only for the queue that issued it, until acked or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(u64);

impl ReceiptHandle {
    /// Creates a receipt from a queue-assigned delivery number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw delivery number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// One received message with its redelivery metadata.
///
/// # Invariants
/// - `receive_count` starts at 1 for the first delivery.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    /// Decoded message payload.
    pub payload: T,
    /// Receipt used to acknowledge the delivery.
    pub receipt: ReceiptHandle,
    /// Number of times this message has been delivered.
    pub receive_count: u32,
}

/// Queue errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue is shut down.
    #[error("queue closed")]
    Closed,
    /// Message payload could not be encoded or decoded.
    #[error("queue serialization failure: {0}")]
    Serialization(String),
    /// Queue backend reported an error.
    #[error("queue error: {0}")]
    Queue(String),
}

/// Durable FIFO-with-retry job queue.
///
/// Messages are redelivered when not acknowledged before the visibility
/// timeout expires; after the configured receive limit they divert to the
/// dead-letter sink. Consumers must be idempotent under replay.
pub trait JobQueue<T>: Send + Sync {
    /// Enqueues one message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the enqueue fails.
    fn enqueue(&self, payload: &T) -> Result<(), QueueError>;

    /// Enqueues a batch of messages, returning the number enqueued.
    ///
    /// Partial success is permitted; callers reconcile through idempotent
    /// re-planning rather than transactional batching.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] only when no message could be enqueued.
    fn enqueue_batch(&self, payloads: &[T]) -> Result<usize, QueueError> {
        let mut enqueued = 0;
        let mut last_error = None;
        for payload in payloads {
            match self.enqueue(payload) {
                Ok(()) => enqueued += 1,
                Err(err) => last_error = Some(err),
            }
        }
        match (enqueued, last_error) {
            (0, Some(err)) => Err(err),
            _ => Ok(enqueued),
        }
    }

    /// Receives the next visible message, waiting up to `max_wait`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the receive fails.
    fn receive(&self, max_wait: Duration) -> Result<Option<Delivery<T>>, QueueError>;

    /// Acknowledges a delivery, removing the message permanently.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the receipt is unknown or expired.
    fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError>;

    /// Returns the number of messages awaiting delivery.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the depth cannot be read.
    fn depth(&self) -> Result<u64, QueueError>;

    /// Returns the number of messages diverted to the dead-letter sink.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the depth cannot be read.
    fn dead_letter_depth(&self) -> Result<u64, QueueError>;

    /// Drains and returns all dead-letter payloads for operator tooling.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the drain fails.
    fn drain_dead_letters(&self) -> Result<Vec<T>, QueueError>;
}

// ============================================================================
// SECTION: Signal Bus
// ============================================================================

/// Signal bus errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Bus delivery failed.
    #[error("signal bus error: {0}")]
    Bus(String),
}

/// Broadcast bus for `run-judged` signals (at-least-once).
pub trait SignalBus: Send + Sync {
    /// Emits a signal to all subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] when emission fails for every subscriber.
    fn emit(&self, signal: &RunJudgedSignal) -> Result<(), SignalError>;
}

// ============================================================================
// SECTION: Model Invoker
// ============================================================================

/// Chat message role.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// Student-side (user) message.
    User,
    /// AI-side (assistant) message.
    Assistant,
}

impl ChatRole {
    /// Returns the stable wire label for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in an invocation prompt.
///
/// # Invariants
/// - `content` is opaque UTF-8 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with the given role and content.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request passed to a model invoker.
///
/// # Invariants
/// - `deadline` bounds the full invocation lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    /// Target model identifier.
    pub model_id: ModelId,
    /// Ordered prompt messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature, when the manifest configures one.
    pub temperature: Option<f64>,
    /// Maximum completion tokens, when bounded.
    pub max_output_tokens: Option<u32>,
    /// Invocation deadline.
    pub deadline: Duration,
}

/// Response returned by a model invoker.
///
/// # Invariants
/// - Token counts reflect the upstream accounting for this invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    /// Generated text.
    pub text: String,
    /// Prompt token count.
    pub input_tokens: u64,
    /// Completion token count.
    pub output_tokens: u64,
    /// Invocation latency in milliseconds.
    pub latency_ms: u64,
}

/// Model invoker errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; transience is encoded
///   per variant via [`InvokerError::is_transient`].
#[derive(Debug, Error)]
pub enum InvokerError {
    /// Invocation exceeded its deadline.
    #[error("invoker timeout: {0}")]
    Timeout(String),
    /// Upstream throttled the invocation.
    #[error("invoker throttled: {0}")]
    Throttled(String),
    /// Transport-level failure (connection, 5xx-equivalent).
    #[error("invoker transport failure: {0}")]
    Transport(String),
    /// Upstream refused the request (4xx-equivalent, content policy).
    #[error("invoker refused: {0}")]
    Refused(String),
    /// Upstream returned an unusable response body.
    #[error("invoker malformed response: {0}")]
    Malformed(String),
    /// No invoker is registered for the requested model.
    #[error("invoker missing model: {0}")]
    MissingModel(String),
}

impl InvokerError {
    /// Returns true for failure classes that retry with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Throttled(_) | Self::Transport(_))
    }
}

/// Pluggable capability for upstream generative model calls.
pub trait ModelInvoker: Send + Sync {
    /// Invokes the model and returns the generated text with usage metrics.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError`] when the invocation fails.
    fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokerError>;
}

// ============================================================================
// SECTION: Scenario Registry
// ============================================================================

/// Dialogue setup returned by the scenario registry.
///
/// # Invariants
/// - `turn_count_target` is at least 1; the manifest turn cap bounds it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Student persona description.
    pub persona: String,
    /// Opening student utterance.
    pub opening_utterance: String,
    /// Target number of dialogue turns.
    pub turn_count_target: u32,
    /// Rubric vector tag carried into run metadata.
    pub rubric_tag: String,
}

/// Scenario registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Registry lookup failed.
    #[error("scenario registry error: {0}")]
    Registry(String),
}

/// Read-only keyed lookup of scenario descriptors.
pub trait ScenarioRegistry: Send + Sync {
    /// Resolves a scenario descriptor, returning `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when the lookup fails.
    fn get(&self, scenario_id: &ScenarioId) -> Result<Option<ScenarioDescriptor>, ScenarioError>;
}

// ============================================================================
// SECTION: Student Strategy
// ============================================================================

/// Student strategy errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StudentError {
    /// Strategy could not produce an utterance.
    #[error("student strategy error: {0}")]
    Strategy(String),
}

/// Produces the next student utterance as a pure function of history.
///
/// Implementations must be deterministic: the utterance for turn `t` depends
/// only on the scenario descriptor and the persisted turns with index `< t`.
pub trait StudentStrategy: Send + Sync {
    /// Returns the student utterance for the next turn.
    ///
    /// `prior_turns` holds the persisted `(student, ai)` exchanges with
    /// indices smaller than the turn under construction, in order.
    ///
    /// # Errors
    ///
    /// Returns [`StudentError`] when the strategy cannot produce an utterance.
    fn next_utterance(
        &self,
        scenario: &ScenarioDescriptor,
        prior_turns: &[TurnRecord],
    ) -> Result<String, StudentError>;
}
