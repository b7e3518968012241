// crates/socratic-bench-core/src/runtime/access.rs
// ============================================================================
// Module: Typed Index Access
// Description: Shared typed reads and conditional updates over the index tier.
// Purpose: Keep the pipeline components on one decode and CAS discipline.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The index tier stores generic composite-key records; this module provides
//! the typed accessors the pipeline components share. Run metadata updates
//! go through a bounded compare-and-set loop so concurrent workers serialize
//! through the store without in-process locks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::catalog;
use crate::core::catalog::CatalogError;
use crate::core::identifiers::ManifestId;
use crate::core::identifiers::RunId;
use crate::core::manifest::Manifest;
use crate::core::records::JudgmentRecord;
use crate::core::records::RunRecord;
use crate::core::records::TurnRecord;
use crate::core::time::Timestamp;
use crate::interfaces::CasOutcome;
use crate::interfaces::IndexError;
use crate::interfaces::IndexStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum compare-and-set attempts before an update gives up.
const MAX_CAS_ATTEMPTS: u32 = 16;

// ============================================================================
// SECTION: Access Errors
// ============================================================================

/// Typed access errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Index tier failure.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Record codec failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
    /// Requested state transition is not admissible.
    #[error("inadmissible run transition: {0}")]
    Transition(String),
    /// Compare-and-set attempts exhausted under contention.
    #[error("cas attempts exhausted for {0}")]
    CasExhausted(String),
}

// ============================================================================
// SECTION: Typed Reads
// ============================================================================

/// Loads a manifest by identifier.
///
/// # Errors
///
/// Returns [`AccessError::NotFound`] when the manifest is absent and
/// [`AccessError`] on store or codec failures.
pub fn load_manifest(
    index: &dyn IndexStore,
    manifest_id: &ManifestId,
) -> Result<Manifest, AccessError> {
    let record = index
        .get(&catalog::manifest_key(manifest_id))?
        .ok_or_else(|| AccessError::NotFound(format!("manifest {manifest_id}")))?;
    Ok(catalog::decode_manifest(&record)?)
}

/// Loads run metadata by identifier, returning `None` when absent.
///
/// # Errors
///
/// Returns [`AccessError`] on store or codec failures.
pub fn load_run(index: &dyn IndexStore, run_id: &RunId) -> Result<Option<RunRecord>, AccessError> {
    match index.get(&catalog::run_key(run_id))? {
        Some(record) => Ok(Some(catalog::decode_run(&record)?)),
        None => Ok(None),
    }
}

/// Loads all turns of a run in turn-index order.
///
/// # Errors
///
/// Returns [`AccessError`] on store or codec failures.
pub fn load_turns(index: &dyn IndexStore, run_id: &RunId) -> Result<Vec<TurnRecord>, AccessError> {
    let records =
        index.query_partition(&catalog::run_partition(run_id), catalog::TURN_SORT_PREFIX)?;
    let mut turns = Vec::with_capacity(records.len());
    for record in &records {
        turns.push(catalog::decode_turn(record)?);
    }
    Ok(turns)
}

/// Loads all judgments of a run in turn-index order.
///
/// # Errors
///
/// Returns [`AccessError`] on store or codec failures.
pub fn load_judgments(
    index: &dyn IndexStore,
    run_id: &RunId,
) -> Result<Vec<JudgmentRecord>, AccessError> {
    let records =
        index.query_partition(&catalog::run_partition(run_id), catalog::JUDGE_SORT_PREFIX)?;
    let mut judgments = Vec::with_capacity(records.len());
    for record in &records {
        judgments.push(catalog::decode_judgment(record)?);
    }
    Ok(judgments)
}

// ============================================================================
// SECTION: Conditional Updates
// ============================================================================

/// Applies a mutation to run metadata through a bounded compare-and-set loop.
///
/// The mutation closure receives the freshly decoded record on every attempt
/// and returns false to abandon the update (no write). Status changes are
/// checked against the admissible transition table before writing.
///
/// # Errors
///
/// Returns [`AccessError::NotFound`] when the run is absent,
/// [`AccessError::Transition`] when the mutation requests an inadmissible
/// status change, and [`AccessError::CasExhausted`] under persistent
/// contention.
pub fn update_run(
    index: &dyn IndexStore,
    run_id: &RunId,
    updated_at: Timestamp,
    mut mutate: impl FnMut(&mut RunRecord) -> bool,
) -> Result<RunRecord, AccessError> {
    for _attempt in 0..MAX_CAS_ATTEMPTS {
        let stored = index
            .get(&catalog::run_key(run_id))?
            .ok_or_else(|| AccessError::NotFound(format!("run {run_id}")))?;
        let previous = catalog::decode_run(&stored)?;
        let mut updated = previous.clone();
        if !mutate(&mut updated) {
            return Ok(previous);
        }
        if updated.status != previous.status
            && !previous.status.can_transition_to(updated.status)
        {
            return Err(AccessError::Transition(format!(
                "run {run_id}: {} -> {}",
                previous.status.as_str(),
                updated.status.as_str()
            )));
        }
        updated.updated_at = updated_at;
        let mut record = catalog::encode_run(&updated)?;
        record.written_at = updated_at;
        match index.put_versioned(&record, stored.revision)? {
            CasOutcome::Applied => return Ok(updated),
            CasOutcome::Conflict => {}
        }
    }
    Err(AccessError::CasExhausted(format!("run {run_id}")))
}
