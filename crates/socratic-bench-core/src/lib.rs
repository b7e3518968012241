// crates/socratic-bench-core/src/lib.rs
// ============================================================================
// Module: Socratic Bench Core
// Description: Data model, interfaces, and pipeline components.
// Purpose: Provide the backend-agnostic core of the benchmark pipeline.
// Dependencies: serde, serde_jcs, serde_json, sha2, thiserror, time, rand
// ============================================================================

//! ## Overview
//! `socratic-bench-core` is the heart of the benchmark pipeline: a state
//! machine that turns a weekly configuration into idempotent runs, drives
//! each run through dialogue generation and judging with queued fan-out,
//! detects completion across distributed workers, and produces deterministic
//! aggregates with weekly roll-ups. Storage, queues, and model invocation
//! are reached only through the [`interfaces`] traits; concrete backends
//! live in sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod telemetry;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::hashing;
pub use crate::core::BenchmarkConfig;
pub use crate::core::Clock;
pub use crate::core::ConfigError;
pub use crate::core::Contribution;
pub use crate::core::CuratedRunArtifact;
pub use crate::core::CuratedTurnEntry;
pub use crate::core::CuratedWeeklyArtifact;
pub use crate::core::DimensionName;
pub use crate::core::DimensionStats;
pub use crate::core::GlobalParameters;
pub use crate::core::HeuristicFeatures;
pub use crate::core::JudgmentArtifact;
pub use crate::core::JudgmentRecord;
pub use crate::core::MAX_TURN_CAP;
pub use crate::core::Manifest;
pub use crate::core::ManifestId;
pub use crate::core::ManualClock;
pub use crate::core::ModelDescriptor;
pub use crate::core::ModelId;
pub use crate::core::PeriodAggregate;
pub use crate::core::PeriodKey;
pub use crate::core::Rubric;
pub use crate::core::RubricDimension;
pub use crate::core::RubricError;
pub use crate::core::RubricVersion;
pub use crate::core::RunId;
pub use crate::core::RunRecord;
pub use crate::core::RunStatus;
pub use crate::core::RunSummary;
pub use crate::core::ScenarioId;
pub use crate::core::ScoreType;
pub use crate::core::ScoringMode;
pub use crate::core::SummaryError;
pub use crate::core::SystemClock;
pub use crate::core::TimeError;
pub use crate::core::Timestamp;
pub use crate::core::TurnArtifact;
pub use crate::core::TurnRecord;
pub use crate::core::catalog;
pub use crate::core::compute_run_summary;
pub use crate::core::derive_run_id;
pub use crate::core::manifest_id_for;
pub use crate::core::hashing::HashAlgorithm;
pub use crate::core::hashing::HashDigest;
pub use crate::core::hashing::HashError;
pub use crate::interfaces::BlobError;
pub use crate::interfaces::BlobStore;
pub use crate::interfaces::CasOutcome;
pub use crate::interfaces::ChatMessage;
pub use crate::interfaces::ChatRole;
pub use crate::interfaces::CreateOutcome;
pub use crate::interfaces::Delivery;
pub use crate::interfaces::IndexError;
pub use crate::interfaces::IndexKey;
pub use crate::interfaces::IndexRecord;
pub use crate::interfaces::IndexStore;
pub use crate::interfaces::InvocationRequest;
pub use crate::interfaces::InvocationResponse;
pub use crate::interfaces::InvokerError;
pub use crate::interfaces::JobQueue;
pub use crate::interfaces::JudgeJob;
pub use crate::interfaces::ModelInvoker;
pub use crate::interfaces::QueueError;
pub use crate::interfaces::ReceiptHandle;
pub use crate::interfaces::RunJob;
pub use crate::interfaces::RunJudgedSignal;
pub use crate::interfaces::ScenarioDescriptor;
pub use crate::interfaces::ScenarioError;
pub use crate::interfaces::ScenarioRegistry;
pub use crate::interfaces::SignalBus;
pub use crate::interfaces::SignalError;
pub use crate::interfaces::StudentError;
pub use crate::interfaces::StudentStrategy;
