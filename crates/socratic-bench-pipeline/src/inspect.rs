// crates/socratic-bench-pipeline/src/inspect.rs
// ============================================================================
// Module: Run Inspection
// Description: Read-only composition of index queries for one run.
// Purpose: Back the CLI status command without a query API dependency.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! Inspection reads the run metadata, turn and judgment counts, and the run
//! summary when curation has landed. It writes nothing and tolerates partial
//! state, so it is safe to call while workers are mid-run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use socratic_bench_core::IndexStore;
use socratic_bench_core::RunId;
use socratic_bench_core::RunRecord;
use socratic_bench_core::RunSummary;
use socratic_bench_core::catalog;
use socratic_bench_core::runtime::AccessError;
use socratic_bench_core::runtime::access;

// ============================================================================
// SECTION: Inspection Shape
// ============================================================================

/// Point-in-time view of one run.
///
/// # Invariants
/// - Counts may disagree with `run.turn_count_actual` while workers are
///   mid-run; that is expected, not corruption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInspection {
    /// Run metadata.
    pub run: RunRecord,
    /// Persisted turn count.
    pub turn_count: u64,
    /// Persisted judgment count.
    pub judgment_count: u64,
    /// Run summary, when curation has landed.
    pub summary: Option<RunSummary>,
}

// ============================================================================
// SECTION: Inspection
// ============================================================================

/// Gathers the inspection view for a run, returning `None` when the run does
/// not exist.
///
/// # Errors
///
/// Returns [`AccessError`] on index failures.
pub fn inspect_run(
    index: &dyn IndexStore,
    run_id: &RunId,
) -> Result<Option<RunInspection>, AccessError> {
    let Some(run) = access::load_run(index, run_id)? else {
        return Ok(None);
    };
    let partition = catalog::run_partition(run_id);
    let turn_count = index.count_partition(&partition, catalog::TURN_SORT_PREFIX)?;
    let judgment_count = index.count_partition(&partition, catalog::JUDGE_SORT_PREFIX)?;
    let summary = match index.get(&catalog::summary_key(run_id))? {
        Some(record) => Some(catalog::decode_summary(&record)?),
        None => None,
    };
    Ok(Some(RunInspection {
        run,
        turn_count,
        judgment_count,
        summary,
    }))
}
