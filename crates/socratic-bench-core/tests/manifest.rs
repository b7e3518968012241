// crates/socratic-bench-core/tests/manifest.rs
// ============================================================================
// Module: Manifest Derivation Tests
// Description: Verifies manifest content addressing and run id derivation.
// ============================================================================
//! ## Overview
//! Ensures equal configurations hash to equal manifest identifiers, run
//! identifiers are pure functions of their inputs, and the time-sortable
//! prefix orders run identifiers by manifest creation time.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use serde_json::json;
use socratic_bench_core::BenchmarkConfig;
use socratic_bench_core::GlobalParameters;
use socratic_bench_core::Manifest;
use socratic_bench_core::ModelDescriptor;
use socratic_bench_core::ModelId;
use socratic_bench_core::RubricVersion;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::Timestamp;
use socratic_bench_core::derive_run_id;
use socratic_bench_core::manifest_id_for;

/// Builds a small valid configuration for the tests.
fn sample_config() -> BenchmarkConfig {
    BenchmarkConfig {
        models: vec![ModelDescriptor {
            model_id: ModelId::new("tutor-small"),
            parameters: BTreeMap::from([("top_p".to_string(), json!(0.9))]),
        }],
        scenarios: vec![ScenarioId::new("fractions-intro")],
        rubric_version: RubricVersion::new("socratic-v1"),
        parameters: GlobalParameters {
            turn_cap: 5,
            judge_model_id: ModelId::new("judge-large"),
            temperature: Some(0.2),
            judge_temperature: None,
            seed: Some(7),
            extra: BTreeMap::new(),
        },
    }
}

// ============================================================================
// SECTION: Manifest Determinism
// ============================================================================

#[test]
fn equal_configs_produce_equal_manifest_ids() {
    let id_a = manifest_id_for(&sample_config()).expect("id a");
    let id_b = manifest_id_for(&sample_config()).expect("id b");
    assert_eq!(id_a, id_b);
}

#[test]
fn changed_config_changes_manifest_id() {
    let base = manifest_id_for(&sample_config()).expect("base id");
    let mut changed = sample_config();
    changed.parameters.turn_cap = 6;
    let other = manifest_id_for(&changed).expect("changed id");
    assert_ne!(base, other);
}

#[test]
fn manifest_id_ignores_creation_time() {
    let config = sample_config();
    let early = Manifest::derive(&config, Timestamp::from_unix_millis(1_000)).expect("early");
    let late = Manifest::derive(&config, Timestamp::from_unix_millis(2_000)).expect("late");
    assert_eq!(early.manifest_id, late.manifest_id);
}

#[test]
fn config_json_round_trip_preserves_manifest_id() {
    let config = sample_config();
    let bytes = serde_json::to_vec(&config).expect("serialize");
    let reparsed = BenchmarkConfig::from_json_bytes(&bytes).expect("reparse");
    assert_eq!(
        manifest_id_for(&config).expect("original"),
        manifest_id_for(&reparsed).expect("reparsed")
    );
}

// ============================================================================
// SECTION: Run Identifier Derivation
// ============================================================================

#[test]
fn run_id_is_pure_and_26_characters() {
    let config = sample_config();
    let manifest = Manifest::derive(&config, Timestamp::from_unix_millis(1_700_000_000_000))
        .expect("manifest");
    let model = ModelId::new("tutor-small");
    let scenario = ScenarioId::new("fractions-intro");

    let first = manifest.run_id(&model, &scenario);
    let second = derive_run_id(&manifest.manifest_id, manifest.created_at, &model, &scenario);
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 26);
}

#[test]
fn run_id_varies_with_model_and_scenario() {
    let config = sample_config();
    let manifest = Manifest::derive(&config, Timestamp::from_unix_millis(1_700_000_000_000))
        .expect("manifest");
    let base = manifest.run_id(&ModelId::new("tutor-small"), &ScenarioId::new("fractions-intro"));
    let other_model =
        manifest.run_id(&ModelId::new("tutor-large"), &ScenarioId::new("fractions-intro"));
    let other_scenario =
        manifest.run_id(&ModelId::new("tutor-small"), &ScenarioId::new("photosynthesis-depth"));
    assert_ne!(base, other_model);
    assert_ne!(base, other_scenario);
}

#[test]
fn run_id_prefix_sorts_by_creation_time() {
    let config = sample_config();
    let model = ModelId::new("tutor-small");
    let scenario = ScenarioId::new("fractions-intro");
    let early = Manifest::derive(&config, Timestamp::from_unix_millis(1_000_000))
        .expect("early manifest")
        .run_id(&model, &scenario);
    let late = Manifest::derive(&config, Timestamp::from_unix_millis(2_000_000_000_000))
        .expect("late manifest")
        .run_id(&model, &scenario);
    assert!(early.as_str() < late.as_str());
}
