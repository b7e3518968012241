// crates/socratic-bench-core/src/core/manifest.rs
// ============================================================================
// Module: Socratic Bench Manifest
// Description: Content-addressed configuration snapshots and run identifiers.
// Purpose: Make planner triggers idempotent through deterministic derivation.
// Dependencies: serde, sha2, crate::core::{config, hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! A manifest is an immutable snapshot of the active configuration. Its
//! identifier is the SHA-256 digest of the canonical serialization of the
//! configuration content, so identical configurations always map to the same
//! manifest. Run identifiers are derived from (manifest, model, scenario)
//! with a time-sortable Crockford base32 prefix taken from the manifest
//! creation time and a hashed suffix, which keeps planner re-triggers from
//! duplicating work.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::core::config::BenchmarkConfig;
use crate::core::config::GlobalParameters;
use crate::core::config::ModelDescriptor;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ManifestId;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::RubricVersion;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ScenarioId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Crockford base32 alphabet used for run identifier encoding.
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Number of base32 characters in the time-sortable run id prefix (48 bits).
const RUN_ID_TIME_CHARS: usize = 10;

/// Number of base32 characters in the hashed run id suffix (80 bits).
const RUN_ID_HASH_CHARS: usize = 16;

/// Total run identifier length in characters.
pub const RUN_ID_LENGTH: usize = RUN_ID_TIME_CHARS + RUN_ID_HASH_CHARS;

// ============================================================================
// SECTION: Manifest Record
// ============================================================================

/// Immutable, content-addressed configuration snapshot.
///
/// # Invariants
/// - `manifest_id` equals the canonical hash of the content fields
///   (`model_set`, `scenario_set`, `rubric_version`, `parameters`).
/// - Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Derived manifest identifier.
    pub manifest_id: ManifestId,
    /// Creation timestamp assigned on first derivation.
    pub created_at: Timestamp,
    /// Ordered candidate model set.
    pub model_set: Vec<ModelDescriptor>,
    /// Ordered scenario identifier set.
    pub scenario_set: Vec<ScenarioId>,
    /// Rubric version applied by the judge.
    pub rubric_version: RubricVersion,
    /// Global parameters.
    pub parameters: GlobalParameters,
}

/// Hashable manifest content, excluding derived and temporal fields.
///
/// # Invariants
/// - Field order matches the canonical serialization contract.
#[derive(Serialize)]
struct ManifestContent<'a> {
    /// Ordered candidate model set.
    model_set: &'a [ModelDescriptor],
    /// Ordered scenario identifier set.
    scenario_set: &'a [ScenarioId],
    /// Rubric version applied by the judge.
    rubric_version: &'a RubricVersion,
    /// Global parameters.
    parameters: &'a GlobalParameters,
}

impl Manifest {
    /// Derives a manifest from a validated configuration.
    ///
    /// `created_at` becomes part of run identifier derivation but not of the
    /// manifest identifier, so re-deriving from an identical configuration
    /// must reuse the stored manifest rather than calling this again.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the configuration cannot be canonicalized.
    pub fn derive(config: &BenchmarkConfig, created_at: Timestamp) -> Result<Self, HashError> {
        let manifest_id = manifest_id_for(config)?;
        Ok(Self {
            manifest_id,
            created_at,
            model_set: config.models.clone(),
            scenario_set: config.scenarios.clone(),
            rubric_version: config.rubric_version.clone(),
            parameters: config.parameters.clone(),
        })
    }

    /// Derives the deterministic run identifier for a (model, scenario) pair.
    #[must_use]
    pub fn run_id(&self, model_id: &ModelId, scenario_id: &ScenarioId) -> RunId {
        derive_run_id(&self.manifest_id, self.created_at, model_id, scenario_id)
    }
}

/// Computes the content-addressed manifest identifier for a configuration.
///
/// # Errors
///
/// Returns [`HashError`] when the configuration cannot be canonicalized.
pub fn manifest_id_for(config: &BenchmarkConfig) -> Result<ManifestId, HashError> {
    let content = ManifestContent {
        model_set: &config.models,
        scenario_set: &config.scenarios,
        rubric_version: &config.rubric_version,
        parameters: &config.parameters,
    };
    let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &content)?;
    Ok(ManifestId::new(digest.as_hex()))
}

// ============================================================================
// SECTION: Run Identifier Derivation
// ============================================================================

/// Derives the 26-character, time-sortable run identifier.
///
/// The prefix encodes the manifest creation time (48 bits, millisecond
/// precision) and the suffix is the leading 80 bits of
/// `SHA-256(manifest_id | model_id | scenario_id)`, so the derivation is a
/// pure function of its inputs.
#[must_use]
pub fn derive_run_id(
    manifest_id: &ManifestId,
    created_at: Timestamp,
    model_id: &ModelId,
    scenario_id: &ScenarioId,
) -> RunId {
    let mut id = String::with_capacity(RUN_ID_LENGTH);
    encode_time_prefix(created_at, &mut id);

    let mut hasher = Sha256::new();
    hasher.update(manifest_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(model_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(scenario_id.as_str().as_bytes());
    let digest = hasher.finalize();
    encode_hash_suffix(&digest[..10], &mut id);

    RunId::new(id)
}

/// Encodes the low 48 bits of the timestamp as ten base32 characters.
fn encode_time_prefix(created_at: Timestamp, out: &mut String) {
    let millis = u64::try_from(created_at.as_unix_millis().max(0)).unwrap_or(0) & ((1 << 48) - 1);
    for index in (0..RUN_ID_TIME_CHARS).rev() {
        let shift = index * 5;
        let value = u8::try_from((millis >> shift) & 0x1f).unwrap_or(0);
        out.push(char::from(CROCKFORD_ALPHABET[usize::from(value)]));
    }
}

/// Encodes ten digest bytes (80 bits) as sixteen base32 characters.
fn encode_hash_suffix(bytes: &[u8], out: &mut String) {
    let mut accumulator: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut emitted = 0;
    for byte in bytes {
        accumulator = (accumulator << 8) | u32::from(*byte);
        bit_count += 8;
        while bit_count >= 5 && emitted < RUN_ID_HASH_CHARS {
            bit_count -= 5;
            let value = u8::try_from((accumulator >> bit_count) & 0x1f).unwrap_or(0);
            out.push(char::from(CROCKFORD_ALPHABET[usize::from(value)]));
            emitted += 1;
        }
    }
}
