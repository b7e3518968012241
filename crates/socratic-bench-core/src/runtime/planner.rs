// crates/socratic-bench-core/src/runtime/planner.rs
// ============================================================================
// Module: Benchmark Planner
// Description: Periodic trigger that derives manifests and enqueues run jobs.
// Purpose: Turn the active configuration into idempotent, content-addressed runs.
// Dependencies: crate::core, crate::interfaces, crate::telemetry
// ============================================================================

//! ## Overview
//! The planner reads the active configuration from the blob tier, derives a
//! content-addressed manifest, and enqueues one run job per (model,
//! scenario) pair. Every step is idempotent: an existing manifest is reused
//! (its original creation time keeps run identifiers stable), run metadata
//! records are created conditionally, and enqueue failures are tolerated
//! because the next trigger reconciles through the same conditional creates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::catalog;
use crate::core::catalog::CatalogError;
use crate::core::config::BenchmarkConfig;
use crate::core::config::ConfigError;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::identifiers::ManifestId;
use crate::core::identifiers::RunId;
use crate::core::manifest::Manifest;
use crate::core::manifest::manifest_id_for;
use crate::core::records::RunRecord;
use crate::core::records::RunStatus;
use crate::core::time::Clock;
use crate::interfaces::BlobError;
use crate::interfaces::BlobStore;
use crate::interfaces::CreateOutcome;
use crate::interfaces::IndexError;
use crate::interfaces::IndexStore;
use crate::interfaces::JobQueue;
use crate::interfaces::RunJob;
use crate::telemetry::Component;
use crate::telemetry::MetricsRecorder;

// ============================================================================
// SECTION: Trigger Input
// ============================================================================

/// Planner trigger input.
///
/// # Invariants
/// - `force` re-enqueues jobs for runs that are still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanTrigger {
    /// Re-enqueue jobs for existing pending runs.
    #[serde(default)]
    pub force: bool,
}

/// Outcome summary of one planner trigger.
///
/// # Invariants
/// - `runs_created + runs_existing` equals the manifest's (model, scenario)
///   cross product size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    /// Manifest derived or reused by this trigger.
    pub manifest_id: ManifestId,
    /// Run metadata records created by this trigger.
    pub runs_created: u32,
    /// Run metadata records that already existed.
    pub runs_existing: u32,
    /// Run jobs enqueued.
    pub enqueued: u32,
    /// Run jobs that failed to enqueue (reconciled by the next trigger).
    pub enqueue_failures: u32,
}

// ============================================================================
// SECTION: Planner Errors
// ============================================================================

/// Planner errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Any error aborts the trigger before jobs are enqueued, except enqueue
///   failures which are counted in the outcome instead.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Active configuration is missing from the blob tier.
    #[error("active configuration not found at {0}")]
    MissingConfig(&'static str),
    /// Active configuration is malformed or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Canonicalization or hashing failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Record codec failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Index tier failure.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Blob tier failure.
    #[error(transparent)]
    Blob(#[from] BlobError),
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Planner component, triggered periodically or on demand.
///
/// # Invariants
/// - Hosts run at most one planner trigger at a time (singleton); concurrent
///   triggers stay correct but waste conditional writes.
pub struct Planner {
    /// Index tier.
    index: Arc<dyn IndexStore>,
    /// Blob tier.
    blobs: Arc<dyn BlobStore>,
    /// Dialogue queue feeding the runners.
    dialogue_queue: Arc<dyn JobQueue<RunJob>>,
    /// Host clock.
    clock: Arc<dyn Clock>,
    /// Metrics recorder.
    metrics: Arc<dyn MetricsRecorder>,
}

impl Planner {
    /// Creates a planner over the provided substrates.
    #[must_use]
    pub fn new(
        index: Arc<dyn IndexStore>,
        blobs: Arc<dyn BlobStore>,
        dialogue_queue: Arc<dyn JobQueue<RunJob>>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            index,
            blobs,
            dialogue_queue,
            clock,
            metrics,
        }
    }

    /// Runs one planner trigger.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError`] when the configuration cannot be loaded or
    /// the manifest cannot be persisted; no jobs are enqueued in that case.
    pub fn plan(&self, trigger: &PlanTrigger) -> Result<PlanOutcome, PlannerError> {
        let config = self.load_active_config()?;
        let manifest = self.resolve_manifest(&config)?;

        let mut runs_created = 0u32;
        let mut runs_existing = 0u32;
        let mut jobs = Vec::new();
        let now = self.clock.now();
        for model in &manifest.model_set {
            for scenario_id in &manifest.scenario_set {
                let run_id = manifest.run_id(&model.model_id, scenario_id);
                let run = RunRecord {
                    run_id: run_id.clone(),
                    manifest_id: manifest.manifest_id.clone(),
                    model_id: model.model_id.clone(),
                    scenario_id: scenario_id.clone(),
                    rubric_version: manifest.rubric_version.clone(),
                    status: RunStatus::Pending,
                    turn_count_target: manifest.parameters.turn_cap,
                    turn_count_actual: 0,
                    created_at: now,
                    updated_at: now,
                    error: None,
                };
                let record = catalog::encode_run(&run)?;
                match self.index.create(&record)? {
                    CreateOutcome::Created => {
                        runs_created += 1;
                        jobs.push(RunJob {
                            run_id,
                            manifest_id: manifest.manifest_id.clone(),
                            model_id: model.model_id.clone(),
                            scenario_id: scenario_id.clone(),
                        });
                    }
                    CreateOutcome::AlreadyExists => {
                        runs_existing += 1;
                        if trigger.force && self.run_is_pending(&run_id)? {
                            jobs.push(RunJob {
                                run_id,
                                manifest_id: manifest.manifest_id.clone(),
                                model_id: model.model_id.clone(),
                                scenario_id: scenario_id.clone(),
                            });
                        }
                    }
                }
            }
        }

        let mut enqueued = 0u32;
        let mut enqueue_failures = 0u32;
        for job in &jobs {
            match self.dialogue_queue.enqueue(job) {
                Ok(()) => enqueued += 1,
                Err(_) => enqueue_failures += 1,
            }
        }
        self.metrics.record_enqueue(Component::Planner, u64::from(enqueued));

        Ok(PlanOutcome {
            manifest_id: manifest.manifest_id,
            runs_created,
            runs_existing,
            enqueued,
            enqueue_failures,
        })
    }

    /// Loads and validates the active configuration.
    fn load_active_config(&self) -> Result<BenchmarkConfig, PlannerError> {
        let bytes = self
            .blobs
            .get(catalog::ACTIVE_CONFIG_PATH)?
            .ok_or(PlannerError::MissingConfig(catalog::ACTIVE_CONFIG_PATH))?;
        Ok(BenchmarkConfig::from_json_bytes(&bytes)?)
    }

    /// Resolves the manifest for a configuration, reusing a stored manifest
    /// (and its creation time) when one exists.
    fn resolve_manifest(&self, config: &BenchmarkConfig) -> Result<Manifest, PlannerError> {
        let manifest_id = manifest_id_for(config)?;
        if let Some(record) = self.index.get(&catalog::manifest_key(&manifest_id))? {
            return Ok(catalog::decode_manifest(&record)?);
        }

        let manifest = Manifest::derive(config, self.clock.now())?;
        let artifact = canonical_json_bytes(&manifest)?;
        self.blobs.put(&catalog::manifest_blob_path(&manifest.manifest_id), &artifact)?;
        match self.index.create(&catalog::encode_manifest(&manifest)?)? {
            CreateOutcome::Created => Ok(manifest),
            CreateOutcome::AlreadyExists => {
                // Lost a race with a concurrent trigger; the stored copy wins
                // so run identifiers stay stable.
                let record = self
                    .index
                    .get(&catalog::manifest_key(&manifest_id))?
                    .ok_or_else(|| IndexError::Corrupt(format!("manifest {manifest_id}")))?;
                Ok(catalog::decode_manifest(&record)?)
            }
        }
    }

    /// Returns true when the run record exists and is still pending.
    fn run_is_pending(&self, run_id: &RunId) -> Result<bool, PlannerError> {
        match self.index.get(&catalog::run_key(run_id))? {
            Some(record) => Ok(catalog::decode_run(&record)?.status == RunStatus::Pending),
            None => Ok(false),
        }
    }
}
