// crates/socratic-bench-core/src/core/config.rs
// ============================================================================
// Module: Socratic Bench Active Configuration
// Description: Active benchmark configuration loaded from the blob tier.
// Purpose: Validate the configuration that seeds manifest derivation.
// Dependencies: serde, serde_json, crate::core::{hashing, identifiers}
// ============================================================================

//! ## Overview
//! The active configuration is a JSON object stored at a well-known blob path.
//! It enumerates the model set, scenario set, rubric version, and global
//! parameters for a benchmark period. The planner canonicalizes this
//! configuration (sorted object keys, declared array order) before hashing it
//! into a manifest identifier, so configuration equality is decided by the
//! canonical form rather than the raw bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ModelId;
use crate::core::identifiers::RubricVersion;
use crate::core::identifiers::ScenarioId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum turn cap accepted by the pipeline.
///
/// Turn indices are zero-padded to three digits in index sort keys, so the
/// cap must keep lexical and numeric ordering aligned.
pub const MAX_TURN_CAP: u32 = 1_000;

// ============================================================================
// SECTION: Configuration Records
// ============================================================================

/// Descriptor for one candidate model in the benchmark.
///
/// # Invariants
/// - `parameters` keys are unique and canonically ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Candidate model identifier.
    pub model_id: ModelId,
    /// Model-specific invocation parameters (opaque to the pipeline).
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

/// Global parameters shared by all runs derived from a configuration.
///
/// # Invariants
/// - `turn_cap` is in `[1, MAX_TURN_CAP]`.
/// - Unknown keys are preserved in `extra` so canonical hashing covers them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalParameters {
    /// Hard upper bound on dialogue turns per run.
    pub turn_cap: u32,
    /// Judge model identifier used for LLM-assisted scoring.
    pub judge_model_id: ModelId,
    /// Sampling temperature for candidate model invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Sampling temperature for judge model invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_temperature: Option<f64>,
    /// Deterministic seed forwarded to invokers that support one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Additional parameters preserved for canonical hashing.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Active benchmark configuration.
///
/// # Invariants
/// - `models` and `scenarios` are non-empty with unique identifiers.
/// - Array order is significant and preserved by canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Ordered candidate model set.
    pub models: Vec<ModelDescriptor>,
    /// Ordered scenario identifier set.
    pub scenarios: Vec<ScenarioId>,
    /// Rubric version applied by the judge.
    pub rubric_version: RubricVersion,
    /// Global parameters.
    pub parameters: GlobalParameters,
}

// ============================================================================
// SECTION: Configuration Errors
// ============================================================================

/// Active configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration bytes are not valid JSON for the expected shape.
    #[error("configuration parse failure: {0}")]
    Parse(String),
    /// Configuration content violates a structural invariant.
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Parsing and Validation
// ============================================================================

impl BenchmarkConfig {
    /// Parses and validates a configuration from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the model or scenario sets are
    /// empty or contain duplicates, or when the turn cap is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("model set is empty".to_string()));
        }
        if self.scenarios.is_empty() {
            return Err(ConfigError::Invalid("scenario set is empty".to_string()));
        }
        let mut model_ids = BTreeSet::new();
        for model in &self.models {
            if !model_ids.insert(model.model_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate model id: {}",
                    model.model_id
                )));
            }
        }
        let mut scenario_ids = BTreeSet::new();
        for scenario in &self.scenarios {
            if !scenario_ids.insert(scenario.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate scenario id: {scenario}")));
            }
        }
        if self.parameters.turn_cap == 0 || self.parameters.turn_cap > MAX_TURN_CAP {
            return Err(ConfigError::Invalid(format!(
                "turn cap {} outside [1, {MAX_TURN_CAP}]",
                self.parameters.turn_cap
            )));
        }
        if self.rubric_version.as_str().is_empty() {
            return Err(ConfigError::Invalid("rubric version is empty".to_string()));
        }
        Ok(())
    }
}
