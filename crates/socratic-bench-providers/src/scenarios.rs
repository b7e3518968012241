// crates/socratic-bench-providers/src/scenarios.rs
// ============================================================================
// Module: Scenario Registries
// Description: Static and JSON-file scenario registry implementations.
// Purpose: Resolve scenario descriptors for the runner.
// Dependencies: serde_json, socratic-bench-core
// ============================================================================

//! ## Overview
//! The scenario registry is a read-only keyed lookup. The static registry
//! serves descriptors from memory; `load_scenarios_json` parses a JSON array
//! of descriptors (the deployment format) into one. Unknown scenario
//! identifiers resolve to `None`; the runner treats that as a permanent
//! failure for the affected run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use socratic_bench_core::ScenarioDescriptor;
use socratic_bench_core::ScenarioError;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::ScenarioRegistry;

// ============================================================================
// SECTION: Static Registry
// ============================================================================

/// In-memory [`ScenarioRegistry`].
///
/// # Invariants
/// - Descriptors are keyed by their own scenario identifier.
#[derive(Debug, Default)]
pub struct StaticScenarioRegistry {
    /// Descriptors keyed by scenario identifier.
    scenarios: BTreeMap<ScenarioId, ScenarioDescriptor>,
}

impl StaticScenarioRegistry {
    /// Creates a registry from descriptors.
    #[must_use]
    pub fn new(descriptors: Vec<ScenarioDescriptor>) -> Self {
        let scenarios = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.scenario_id.clone(), descriptor))
            .collect();
        Self {
            scenarios,
        }
    }

    /// Returns the number of registered scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Returns true when no scenarios are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl ScenarioRegistry for StaticScenarioRegistry {
    fn get(&self, scenario_id: &ScenarioId) -> Result<Option<ScenarioDescriptor>, ScenarioError> {
        Ok(self.scenarios.get(scenario_id).cloned())
    }
}

// ============================================================================
// SECTION: JSON Loading
// ============================================================================

/// Parses a JSON array of scenario descriptors into a static registry.
///
/// # Errors
///
/// Returns [`ScenarioError::Registry`] when the bytes are not a valid
/// descriptor array or a descriptor fails validation.
pub fn load_scenarios_json(bytes: &[u8]) -> Result<StaticScenarioRegistry, ScenarioError> {
    let descriptors: Vec<ScenarioDescriptor> = serde_json::from_slice(bytes)
        .map_err(|err| ScenarioError::Registry(format!("scenario parse failure: {err}")))?;
    for descriptor in &descriptors {
        if descriptor.turn_count_target == 0 {
            return Err(ScenarioError::Registry(format!(
                "scenario {} has a zero turn target",
                descriptor.scenario_id
            )));
        }
        if descriptor.opening_utterance.trim().is_empty() {
            return Err(ScenarioError::Registry(format!(
                "scenario {} has an empty opening utterance",
                descriptor.scenario_id
            )));
        }
    }
    Ok(StaticScenarioRegistry::new(descriptors))
}
