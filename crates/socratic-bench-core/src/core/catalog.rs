// crates/socratic-bench-core/src/core/catalog.rs
// ============================================================================
// Module: Socratic Bench Storage Catalog
// Description: Composite key layout, blob paths, and record codecs.
// Purpose: Keep every component writing the same index and blob shapes.
// Dependencies: serde_json, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The catalog is the single source of truth for the storage layout. The
//! index tier uses one logical table keyed by (partition key, sort key):
//!
//! | Entity | partition key | sort key |
//! |---|---|---|
//! | Manifest | `MANIFEST#<id>` | `META` |
//! | Run metadata | `RUN#<run_id>` | `META` |
//! | Turn | `RUN#<run_id>` | `TURN#<nnn>` |
//! | Judgment | `RUN#<run_id>` | `JUDGE#<nnn>` |
//! | Run summary | `RUN#<run_id>` | `SUMMARY` |
//! | Period aggregate | `WEEK#<period>#MODEL#<model_id>` | `SUMMARY` |
//!
//! Turn indices are zero-padded to three digits so lexical order equals
//! numeric order up to the turn cap. Blob paths mirror the raw/curated split
//! of the event log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::identifiers::ManifestId;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::PeriodKey;
use crate::core::identifiers::RunId;
use crate::core::manifest::Manifest;
use crate::core::records::JudgmentRecord;
use crate::core::records::RunRecord;
use crate::core::records::TurnRecord;
use crate::core::summary::PeriodAggregate;
use crate::core::summary::RunSummary;
use crate::interfaces::IndexKey;
use crate::interfaces::IndexRecord;

// ============================================================================
// SECTION: Sort Keys
// ============================================================================

/// Sort key for singleton metadata records.
pub const SORT_META: &str = "META";

/// Sort key for run summaries and period aggregates.
pub const SORT_SUMMARY: &str = "SUMMARY";

/// Sort-key prefix for turn records.
pub const TURN_SORT_PREFIX: &str = "TURN#";

/// Sort-key prefix for judgment records.
pub const JUDGE_SORT_PREFIX: &str = "JUDGE#";

// ============================================================================
// SECTION: Catalog Errors
// ============================================================================

/// Record codec errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Typed record could not be encoded into an index payload.
    #[error("catalog encode failure: {0}")]
    Encode(String),
    /// Index payload could not be decoded into the typed record.
    #[error("catalog decode failure: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Key Builders
// ============================================================================

/// Returns the partition key for a manifest.
#[must_use]
pub fn manifest_partition(manifest_id: &ManifestId) -> String {
    format!("MANIFEST#{manifest_id}")
}

/// Returns the partition key for a run.
#[must_use]
pub fn run_partition(run_id: &RunId) -> String {
    format!("RUN#{run_id}")
}

/// Returns the partition key for a weekly (period, model) aggregate.
#[must_use]
pub fn week_partition(period_key: &PeriodKey, model_id: &ModelId) -> String {
    format!("WEEK#{period_key}#MODEL#{model_id}")
}

/// Returns the index key for a manifest record.
#[must_use]
pub fn manifest_key(manifest_id: &ManifestId) -> IndexKey {
    IndexKey::new(manifest_partition(manifest_id), SORT_META)
}

/// Returns the index key for a run metadata record.
#[must_use]
pub fn run_key(run_id: &RunId) -> IndexKey {
    IndexKey::new(run_partition(run_id), SORT_META)
}

/// Returns the sort key for a turn record.
#[must_use]
pub fn turn_sort_key(turn_index: u32) -> String {
    format!("{TURN_SORT_PREFIX}{turn_index:03}")
}

/// Returns the sort key for a judgment record.
#[must_use]
pub fn judge_sort_key(turn_index: u32) -> String {
    format!("{JUDGE_SORT_PREFIX}{turn_index:03}")
}

/// Returns the index key for a turn record.
#[must_use]
pub fn turn_key(run_id: &RunId, turn_index: u32) -> IndexKey {
    IndexKey::new(run_partition(run_id), turn_sort_key(turn_index))
}

/// Returns the index key for a judgment record.
#[must_use]
pub fn judgment_key(run_id: &RunId, turn_index: u32) -> IndexKey {
    IndexKey::new(run_partition(run_id), judge_sort_key(turn_index))
}

/// Returns the index key for a run summary record.
#[must_use]
pub fn summary_key(run_id: &RunId) -> IndexKey {
    IndexKey::new(run_partition(run_id), SORT_SUMMARY)
}

/// Returns the index key for a period aggregate record.
#[must_use]
pub fn period_aggregate_key(period_key: &PeriodKey, model_id: &ModelId) -> IndexKey {
    IndexKey::new(week_partition(period_key, model_id), SORT_SUMMARY)
}

// ============================================================================
// SECTION: Blob Paths
// ============================================================================

/// Well-known blob path of the active configuration.
pub const ACTIVE_CONFIG_PATH: &str = "config/active";

/// Returns the blob path for a manifest artifact.
#[must_use]
pub fn manifest_blob_path(manifest_id: &ManifestId) -> String {
    format!("manifests/{manifest_id}")
}

/// Returns the blob path for a raw turn artifact.
#[must_use]
pub fn turn_blob_path(run_id: &RunId, turn_index: u32) -> String {
    format!("raw/runs/{run_id}/turn_{turn_index:03}")
}

/// Returns the blob path for a raw judgment artifact.
#[must_use]
pub fn judgment_blob_path(run_id: &RunId, turn_index: u32) -> String {
    format!("raw/runs/{run_id}/judge_{turn_index:03}")
}

/// Returns the blob path for a curated run artifact.
#[must_use]
pub fn curated_run_path(run_id: &RunId) -> String {
    format!("curated/runs/{run_id}")
}

/// Returns the blob path for a curated weekly artifact.
#[must_use]
pub fn curated_weekly_path(period_key: &PeriodKey, model_id: &ModelId) -> String {
    format!("curated/weekly/{period_key}/{model_id}")
}

// ============================================================================
// SECTION: Record Codecs
// ============================================================================

/// Encodes a typed payload into JSON for an index record.
fn encode_payload<T: Serialize>(value: &T) -> Result<serde_json::Value, CatalogError> {
    serde_json::to_value(value).map_err(|err| CatalogError::Encode(err.to_string()))
}

/// Decodes a typed payload from an index record.
fn decode_payload<T: DeserializeOwned>(record: &IndexRecord) -> Result<T, CatalogError> {
    serde_json::from_value(record.payload.clone())
        .map_err(|err| CatalogError::Decode(err.to_string()))
}

/// Encodes a manifest into its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Encode`] when serialization fails.
pub fn encode_manifest(manifest: &Manifest) -> Result<IndexRecord, CatalogError> {
    Ok(IndexRecord {
        key: manifest_key(&manifest.manifest_id),
        payload: encode_payload(manifest)?,
        blob_pointer: Some(manifest_blob_path(&manifest.manifest_id)),
        model_id: None,
        manifest_id: None,
        revision: 0,
        written_at: manifest.created_at,
    })
}

/// Decodes a manifest from its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the payload is malformed.
pub fn decode_manifest(record: &IndexRecord) -> Result<Manifest, CatalogError> {
    decode_payload(record)
}

/// Encodes run metadata into its index record with secondary attributes.
///
/// # Errors
///
/// Returns [`CatalogError::Encode`] when serialization fails.
pub fn encode_run(run: &RunRecord) -> Result<IndexRecord, CatalogError> {
    Ok(IndexRecord {
        key: run_key(&run.run_id),
        payload: encode_payload(run)?,
        blob_pointer: None,
        model_id: Some(run.model_id.as_str().to_string()),
        manifest_id: Some(run.manifest_id.as_str().to_string()),
        revision: 0,
        written_at: run.updated_at,
    })
}

/// Decodes run metadata from its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the payload is malformed.
pub fn decode_run(record: &IndexRecord) -> Result<RunRecord, CatalogError> {
    decode_payload(record)
}

/// Encodes a turn into its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Encode`] when serialization fails.
pub fn encode_turn(turn: &TurnRecord) -> Result<IndexRecord, CatalogError> {
    Ok(IndexRecord {
        key: turn_key(&turn.run_id, turn.turn_index),
        payload: encode_payload(turn)?,
        blob_pointer: Some(turn.blob_pointer.clone()),
        model_id: None,
        manifest_id: None,
        revision: 0,
        written_at: turn.created_at,
    })
}

/// Decodes a turn from its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the payload is malformed.
pub fn decode_turn(record: &IndexRecord) -> Result<TurnRecord, CatalogError> {
    decode_payload(record)
}

/// Encodes a judgment into its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Encode`] when serialization fails.
pub fn encode_judgment(judgment: &JudgmentRecord) -> Result<IndexRecord, CatalogError> {
    Ok(IndexRecord {
        key: judgment_key(&judgment.run_id, judgment.turn_index),
        payload: encode_payload(judgment)?,
        blob_pointer: Some(judgment.blob_pointer.clone()),
        model_id: None,
        manifest_id: None,
        revision: 0,
        written_at: judgment.created_at,
    })
}

/// Decodes a judgment from its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the payload is malformed.
pub fn decode_judgment(record: &IndexRecord) -> Result<JudgmentRecord, CatalogError> {
    decode_payload(record)
}

/// Encodes a run summary into its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Encode`] when serialization fails.
pub fn encode_summary(summary: &RunSummary) -> Result<IndexRecord, CatalogError> {
    Ok(IndexRecord {
        key: summary_key(&summary.run_id),
        payload: encode_payload(summary)?,
        blob_pointer: Some(curated_run_path(&summary.run_id)),
        model_id: None,
        manifest_id: None,
        revision: 0,
        written_at: summary.aggregated_at,
    })
}

/// Decodes a run summary from its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the payload is malformed.
pub fn decode_summary(record: &IndexRecord) -> Result<RunSummary, CatalogError> {
    decode_payload(record)
}

/// Encodes a period aggregate into its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Encode`] when serialization fails.
pub fn encode_period_aggregate(aggregate: &PeriodAggregate) -> Result<IndexRecord, CatalogError> {
    Ok(IndexRecord {
        key: period_aggregate_key(&aggregate.period_key, &aggregate.model_id),
        payload: encode_payload(aggregate)?,
        blob_pointer: Some(curated_weekly_path(&aggregate.period_key, &aggregate.model_id)),
        model_id: Some(aggregate.model_id.as_str().to_string()),
        manifest_id: None,
        revision: 0,
        written_at: aggregate.last_updated_at,
    })
}

/// Decodes a period aggregate from its index record.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the payload is malformed.
pub fn decode_period_aggregate(record: &IndexRecord) -> Result<PeriodAggregate, CatalogError> {
    decode_payload(record)
}

/// Parses the turn index out of a turn or judgment sort key.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] when the sort key has no valid index.
pub fn parse_sort_index(sort_key: &str) -> Result<u32, CatalogError> {
    let digits = sort_key
        .strip_prefix(TURN_SORT_PREFIX)
        .or_else(|| sort_key.strip_prefix(JUDGE_SORT_PREFIX))
        .ok_or_else(|| CatalogError::Decode(format!("sort key {sort_key} has no index prefix")))?;
    digits
        .parse::<u32>()
        .map_err(|err| CatalogError::Decode(format!("sort key {sort_key}: {err}")))
}
