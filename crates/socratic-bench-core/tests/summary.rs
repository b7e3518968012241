// crates/socratic-bench-core/tests/summary.rs
// ============================================================================
// Module: Summary and Aggregate Tests
// Description: Verifies run summary math and period aggregate convergence.
// ============================================================================
//! ## Overview
//! Exercises the mixed-compliance aggregation example end to end: two runs
//! with known scores produce the expected summaries, and the weekly
//! aggregate converges to the same value regardless of absorb order or
//! duplicate absorption.

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

use socratic_bench_core::Contribution;
use socratic_bench_core::DimensionName;
use socratic_bench_core::HeuristicFeatures;
use socratic_bench_core::JudgmentRecord;
use socratic_bench_core::ManifestId;
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
use socratic_bench_core::SummaryError;
use socratic_bench_core::Timestamp;
use socratic_bench_core::TurnRecord;
use socratic_bench_core::compute_run_summary;
use socratic_bench_core::hashing::canonical_json_bytes;

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

/// Builds a run record for the given identifier.
fn run_record(run_id: &str) -> RunRecord {
    RunRecord {
        run_id: RunId::new(run_id),
        manifest_id: ManifestId::new("manifest-a"),
        model_id: ModelId::new("tutor-small"),
        scenario_id: ScenarioId::new("fractions-intro"),
        rubric_version: RubricVersion::new("socratic-v1"),
        status: RunStatus::Completed,
        turn_count_target: 3,
        turn_count_actual: 3,
        created_at: Timestamp::from_unix_millis(1_700_000_000_000),
        updated_at: Timestamp::from_unix_millis(1_700_000_300_000),
        error: None,
    }
}

/// Builds dense turns and judgments with the given questioning scores.
fn turns_and_judgments(run_id: &str, scores: &[f64]) -> (Vec<TurnRecord>, Vec<JudgmentRecord>) {
    let mut turns = Vec::new();
    let mut judgments = Vec::new();
    for (index, score) in scores.iter().enumerate() {
        let turn_index = u32::try_from(index).expect("turn index");
        turns.push(TurnRecord {
            run_id: RunId::new(run_id),
            turn_index,
            student_text: format!("student message {turn_index}"),
            ai_text: "What do you think?".to_string(),
            input_token_count: 50,
            output_token_count: 5,
            latency_ms: 100,
            created_at: Timestamp::from_unix_millis(1_700_000_000_000 + i64::from(turn_index)),
            blob_pointer: format!("raw/runs/{run_id}/turn_{turn_index:03}"),
        });
        judgments.push(JudgmentRecord {
            run_id: RunId::new(run_id),
            turn_index,
            rubric_scores: BTreeMap::from([(DimensionName::new("questioning"), *score)]),
            boolean_scores: BTreeMap::new(),
            heuristic_features: HeuristicFeatures {
                ends_with_question: true,
                question_count: 1,
                word_count: 4,
                open_prompt_count: 1,
                directive_count: 0,
                well_formed: true,
            },
            judge_model_id: ModelId::new("judge-large"),
            judge_latency_ms: 0,
            created_at: Timestamp::from_unix_millis(1_700_000_100_000 + i64::from(turn_index)),
            error: None,
            blob_pointer: format!("raw/runs/{run_id}/judge_{turn_index:03}"),
        });
    }
    (turns, judgments)
}

/// Absolute-difference float comparison.
fn close(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

// ============================================================================
// SECTION: Run Summary Math
// ============================================================================

#[test]
fn mixed_compliance_summary_for_first_run() {
    let run = run_record("run-a");
    let (turns, judgments) = turns_and_judgments("run-a", &[0.9, 0.9, 0.2]);
    let summary =
        compute_run_summary(&run, &turns, &judgments, &questioning_rubric()).expect("summary");

    let stats = &summary.dimension_stats[&DimensionName::new("questioning")];
    assert!(close(stats.mean, 2.0 / 3.0));
    assert!(close(stats.min, 0.2));
    assert!(close(stats.max, 0.9));
    assert!(close(summary.compliance_rate, 2.0 / 3.0));
    assert_eq!(summary.first_failure_turn, 2);
    assert!(close(summary.violation_rate, 0.0));
    assert_eq!(summary.total_input_tokens, 150);
    assert_eq!(summary.total_output_tokens, 15);
}

#[test]
fn fully_compliant_summary_reports_first_failure_at_turn_count() {
    let run = run_record("run-b");
    let (turns, judgments) = turns_and_judgments("run-b", &[0.8, 0.6]);
    let summary =
        compute_run_summary(&run, &turns, &judgments, &questioning_rubric()).expect("summary");

    assert!(close(summary.compliance_rate, 1.0));
    assert_eq!(summary.first_failure_turn, 2);
    assert_eq!(summary.first_failure_turn, summary.turn_count);
    let stats = &summary.dimension_stats[&DimensionName::new("questioning")];
    assert!(close(stats.mean, 0.7));
}

#[test]
fn summary_is_deterministic_and_canonically_stable() {
    let run = run_record("run-a");
    let (turns, judgments) = turns_and_judgments("run-a", &[0.9, 0.9, 0.2]);
    let rubric = questioning_rubric();
    let first = compute_run_summary(&run, &turns, &judgments, &rubric).expect("first");
    let second = compute_run_summary(&run, &turns, &judgments, &rubric).expect("second");
    assert_eq!(first, second);

    let bytes_a = canonical_json_bytes(&first).expect("bytes a");
    let bytes_b = canonical_json_bytes(&second).expect("bytes b");
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn count_mismatch_is_rejected() {
    let run = run_record("run-a");
    let (turns, mut judgments) = turns_and_judgments("run-a", &[0.9, 0.9, 0.2]);
    judgments.pop();
    let err = compute_run_summary(&run, &turns, &judgments, &questioning_rubric()).unwrap_err();
    assert!(matches!(err, SummaryError::Mismatch(_)));
}

#[test]
fn ill_formed_turns_raise_violation_rate() {
    let run = run_record("run-c");
    let (turns, mut judgments) = turns_and_judgments("run-c", &[0.9, 0.9]);
    judgments[1].heuristic_features.well_formed = false;
    let summary =
        compute_run_summary(&run, &turns, &judgments, &questioning_rubric()).expect("summary");
    assert!(close(summary.violation_rate, 0.5));
}

// ============================================================================
// SECTION: Period Aggregate Convergence
// ============================================================================

/// Builds the two mixed-compliance contributions from the summaries.
fn mixed_contributions() -> (RunId, Contribution, RunId, Contribution) {
    let rubric = questioning_rubric();
    let run_a = run_record("run-a");
    let (turns_a, judgments_a) = turns_and_judgments("run-a", &[0.9, 0.9, 0.2]);
    let summary_a = compute_run_summary(&run_a, &turns_a, &judgments_a, &rubric).expect("a");

    let run_b = run_record("run-b");
    let (turns_b, judgments_b) = turns_and_judgments("run-b", &[0.8, 0.6]);
    let summary_b = compute_run_summary(&run_b, &turns_b, &judgments_b, &rubric).expect("b");

    (
        run_a.run_id,
        Contribution::from_summary(&summary_a),
        run_b.run_id,
        Contribution::from_summary(&summary_b),
    )
}

#[test]
fn aggregate_matches_mixed_compliance_expectations() {
    let (id_a, contribution_a, id_b, contribution_b) = mixed_contributions();
    let mut aggregate =
        PeriodAggregate::empty(PeriodKey::new("2023-W46"), ModelId::new("tutor-small"));
    assert!(aggregate.absorb(id_a, contribution_a));
    assert!(aggregate.absorb(id_b, contribution_b));

    assert_eq!(aggregate.run_count, 2);
    let mean = aggregate.dimension_means[&DimensionName::new("questioning")];
    assert!(close(mean, (2.0 / 3.0 + 0.7) / 2.0));
    assert!(close(aggregate.compliance_mean, (2.0 / 3.0 + 1.0) / 2.0));
}

#[test]
fn aggregate_is_order_independent_and_duplicate_safe() {
    let (id_a, contribution_a, id_b, contribution_b) = mixed_contributions();

    let mut forward =
        PeriodAggregate::empty(PeriodKey::new("2023-W46"), ModelId::new("tutor-small"));
    assert!(forward.absorb(id_a.clone(), contribution_a.clone()));
    assert!(forward.absorb(id_b.clone(), contribution_b.clone()));

    let mut reverse =
        PeriodAggregate::empty(PeriodKey::new("2023-W46"), ModelId::new("tutor-small"));
    assert!(reverse.absorb(id_b.clone(), contribution_b.clone()));
    assert!(reverse.absorb(id_a.clone(), contribution_a.clone()));
    assert_eq!(forward, reverse);

    // Duplicate absorption is a no-op.
    assert!(!reverse.absorb(id_a, contribution_a));
    assert!(!reverse.absorb(id_b, contribution_b));
    assert_eq!(forward, reverse);

    let bytes_forward = canonical_json_bytes(&forward).expect("forward bytes");
    let bytes_reverse = canonical_json_bytes(&reverse).expect("reverse bytes");
    assert_eq!(bytes_forward, bytes_reverse);
}

#[test]
fn replacing_a_contribution_recomputes_the_aggregate() {
    let (id_a, contribution_a, _id_b, contribution_b) = mixed_contributions();
    let mut aggregate =
        PeriodAggregate::empty(PeriodKey::new("2023-W46"), ModelId::new("tutor-small"));
    assert!(aggregate.absorb(id_a.clone(), contribution_a));
    assert_eq!(aggregate.run_count, 1);

    // A re-curated run replaces its contribution instead of double counting.
    assert!(aggregate.absorb(id_a, contribution_b));
    assert_eq!(aggregate.run_count, 1);
    let mean = aggregate.dimension_means[&DimensionName::new("questioning")];
    assert!(close(mean, 0.7));
}

#[test]
fn period_key_uses_iso_week_form() {
    let period = Timestamp::from_unix_millis(1_700_000_000_000).period_key().expect("period");
    assert_eq!(period.as_str(), "2023-W46");
}
