// crates/socratic-bench-core/tests/proptest_pipeline.rs
// ============================================================================
// Module: Pipeline Property Tests
// Description: Property-based checks for determinism and aggregate laws.
// ============================================================================
//! ## Overview
//! Property coverage for the pipeline's testable laws: manifest and run id
//! determinism, score-domain safety of the heuristic scorer over arbitrary
//! text, compliance bounds of run summaries, and order-independent
//! convergence of period aggregates.

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
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use proptest::prelude::*;
use socratic_bench_core::BenchmarkConfig;
use socratic_bench_core::Contribution;
use socratic_bench_core::DimensionName;
use socratic_bench_core::GlobalParameters;
use socratic_bench_core::HeuristicFeatures;
use socratic_bench_core::JudgmentRecord;
use socratic_bench_core::ManifestId;
use socratic_bench_core::ModelDescriptor;
use socratic_bench_core::ModelId;
use socratic_bench_core::PeriodAggregate;
use socratic_bench_core::PeriodKey;
use socratic_bench_core::Rubric;
use socratic_bench_core::RubricDimension;
use socratic_bench_core::RubricVersion;
use socratic_bench_core::RunId;
use socratic_bench_core::RunRecord;
use socratic_bench_core::RunStatus;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::ScoreType;
use socratic_bench_core::Timestamp;
use socratic_bench_core::TurnRecord;
use socratic_bench_core::compute_run_summary;
use socratic_bench_core::derive_run_id;
use socratic_bench_core::manifest_id_for;
use socratic_bench_core::runtime::extract_features;
use socratic_bench_core::runtime::heuristic_score_set;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rubric with a single thresholded continuous dimension.
fn questioning_rubric() -> Rubric {
    Rubric {
        version: RubricVersion::new("socratic-v1"),
        dimensions: vec![RubricDimension {
            name: DimensionName::new("questioning"),
            score_type: ScoreType::Continuous {
                min: 0.0,
                max: 1.0,
            },
            threshold: Some(0.5),
            weight: None,
        }],
    }
}

/// Builds a config whose identity is driven by the given fields.
fn config_for(model_id: &str, scenario_id: &str, turn_cap: u32) -> BenchmarkConfig {
    BenchmarkConfig {
        models: vec![ModelDescriptor {
            model_id: ModelId::new(model_id),
            parameters: BTreeMap::new(),
        }],
        scenarios: vec![ScenarioId::new(scenario_id)],
        rubric_version: RubricVersion::new("socratic-v1"),
        parameters: GlobalParameters {
            turn_cap,
            judge_model_id: ModelId::new("judge-large"),
            temperature: None,
            judge_temperature: None,
            seed: None,
            extra: BTreeMap::new(),
        },
    }
}

/// Builds dense turns and judgments with the given questioning scores.
fn run_fixture(run_id: &str, scores: &[f64]) -> (RunRecord, Vec<TurnRecord>, Vec<JudgmentRecord>) {
    let run = RunRecord {
        run_id: RunId::new(run_id),
        manifest_id: ManifestId::new("manifest-p"),
        model_id: ModelId::new("tutor-small"),
        scenario_id: ScenarioId::new("fractions-intro"),
        rubric_version: RubricVersion::new("socratic-v1"),
        status: RunStatus::Completed,
        turn_count_target: u32::try_from(scores.len()).expect("target"),
        turn_count_actual: u32::try_from(scores.len()).expect("actual"),
        created_at: Timestamp::from_unix_millis(1_700_000_000_000),
        updated_at: Timestamp::from_unix_millis(1_700_000_000_000),
        error: None,
    };
    let mut turns = Vec::new();
    let mut judgments = Vec::new();
    for (index, score) in scores.iter().enumerate() {
        let turn_index = u32::try_from(index).expect("index");
        turns.push(TurnRecord {
            run_id: RunId::new(run_id),
            turn_index,
            student_text: "prompt".to_string(),
            ai_text: "What do you think?".to_string(),
            input_token_count: 10,
            output_token_count: 5,
            latency_ms: 20,
            created_at: Timestamp::from_unix_millis(1_700_000_000_000),
            blob_pointer: format!("raw/runs/{run_id}/turn_{turn_index:03}"),
        });
        judgments.push(JudgmentRecord {
            run_id: RunId::new(run_id),
            turn_index,
            rubric_scores: BTreeMap::from([(DimensionName::new("questioning"), *score)]),
            boolean_scores: BTreeMap::new(),
            heuristic_features: HeuristicFeatures::default(),
            judge_model_id: ModelId::new("judge-large"),
            judge_latency_ms: 0,
            created_at: Timestamp::from_unix_millis(1_700_000_000_000),
            error: None,
            blob_pointer: format!("raw/runs/{run_id}/judge_{turn_index:03}"),
        });
    }
    (run, turns, judgments)
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn manifest_and_run_ids_are_pure_functions(
        model in "[a-z]{1,12}",
        scenario in "[a-z]{1,12}",
        turn_cap in 1_u32..=20,
        millis in 0_i64..=2_000_000_000_000,
    ) {
        let config = config_for(&model, &scenario, turn_cap);
        let id_a = manifest_id_for(&config).expect("id a");
        let id_b = manifest_id_for(&config).expect("id b");
        prop_assert_eq!(&id_a, &id_b);

        let created_at = Timestamp::from_unix_millis(millis);
        let run_a = derive_run_id(&id_a, created_at, &ModelId::new(&model), &ScenarioId::new(&scenario));
        let run_b = derive_run_id(&id_b, created_at, &ModelId::new(&model), &ScenarioId::new(&scenario));
        prop_assert_eq!(&run_a, &run_b);
        prop_assert_eq!(run_a.as_str().len(), 26);
    }

    #[test]
    fn heuristic_scores_stay_in_domain(text in ".{0,400}") {
        let rubric = Rubric::socratic_v1();
        let scores = heuristic_score_set(&rubric, &extract_features(&text));
        prop_assert!(rubric.validate_scores(&scores.rubric_scores, &scores.boolean_scores).is_ok());

        let rubric_v2 = Rubric::socratic_v2();
        let scores_v2 = heuristic_score_set(&rubric_v2, &extract_features(&text));
        prop_assert!(
            rubric_v2.validate_scores(&scores_v2.rubric_scores, &scores_v2.boolean_scores).is_ok()
        );
    }

    #[test]
    fn summary_compliance_bounds_hold(scores in proptest::collection::vec(0.0_f64..=1.0, 1..=12)) {
        let (run, turns, judgments) = run_fixture("run-prop", &scores);
        let summary = compute_run_summary(&run, &turns, &judgments, &questioning_rubric())
            .expect("summary");

        prop_assert!(summary.compliance_rate >= 0.0 && summary.compliance_rate <= 1.0);
        prop_assert!(summary.first_failure_turn <= summary.turn_count);
        let fully_compliant = (summary.compliance_rate - 1.0).abs() < 1e-12;
        prop_assert_eq!(summary.first_failure_turn == summary.turn_count, fully_compliant);
    }

    #[test]
    fn period_aggregate_converges_under_any_order(
        runs in proptest::collection::vec(
            (proptest::collection::vec(0.0_f64..=1.0, 1..=5), 0_u8..=3),
            1..=6,
        ),
    ) {
        let rubric = questioning_rubric();
        let mut contributions = Vec::new();
        for (index, (scores, _salt)) in runs.iter().enumerate() {
            let run_id = format!("run-{index:03}");
            let (run, turns, judgments) = run_fixture(&run_id, scores);
            let summary = compute_run_summary(&run, &turns, &judgments, &rubric).expect("summary");
            contributions.push((run.run_id, Contribution::from_summary(&summary)));
        }

        let mut forward = PeriodAggregate::empty(
            PeriodKey::new("2023-W46"),
            ModelId::new("tutor-small"),
        );
        for (run_id, contribution) in &contributions {
            forward.absorb(run_id.clone(), contribution.clone());
        }

        let mut reverse = PeriodAggregate::empty(
            PeriodKey::new("2023-W46"),
            ModelId::new("tutor-small"),
        );
        for (run_id, contribution) in contributions.iter().rev() {
            reverse.absorb(run_id.clone(), contribution.clone());
        }
        // Duplicate a prefix to model at-least-once signal delivery.
        for (run_id, contribution) in contributions.iter().take(2) {
            reverse.absorb(run_id.clone(), contribution.clone());
        }

        prop_assert_eq!(forward, reverse);
    }
}
