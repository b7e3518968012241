// system-tests/tests/pipeline.rs
// ============================================================================
// Module: End-to-End Pipeline Tests
// Description: Drives the full pipeline through its literal acceptance flows.
// ============================================================================
//! ## Overview
//! Covers the pipeline's acceptance flows end to end over in-memory
//! substrates: the single-turn happy path, redelivery idempotence, planner
//! re-triggering, partial failure with resumption, the completion-detection
//! race with duplicate curation signals, and mixed-compliance weekly
//! aggregation.

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
use std::time::Duration;

use socratic_bench_core::BlobStore;
use socratic_bench_core::DimensionName;
use socratic_bench_core::HeuristicFeatures;
use socratic_bench_core::JobQueue;
use socratic_bench_core::JudgeJob;
use socratic_bench_core::JudgmentRecord;
use socratic_bench_core::ManifestId;
use socratic_bench_core::ModelId;
use socratic_bench_core::RubricVersion;
use socratic_bench_core::RunId;
use socratic_bench_core::RunJudgedSignal;
use socratic_bench_core::RunRecord;
use socratic_bench_core::RunStatus;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::Timestamp;
use socratic_bench_core::TurnRecord;
use socratic_bench_core::catalog;
use socratic_bench_core::hashing::canonical_json_bytes;
use socratic_bench_core::runtime::CurationOutcome;
use system_tests::EPOCH_MS;
use system_tests::JUDGE_MODEL;
use system_tests::MODEL;
use system_tests::World;
use system_tests::scenario_with_target;
use system_tests::single_model_config;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Absolute-difference float comparison.
fn close(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

/// Returns the single planned run for the world's model.
fn only_run(world: &World) -> RunRecord {
    let runs = world.runs_for_model(&ModelId::new(MODEL));
    assert_eq!(runs.len(), 1, "expected exactly one run");
    runs[0].clone()
}

// ============================================================================
// SECTION: Single-Turn Happy Path
// ============================================================================

#[test]
fn single_turn_happy_path_produces_complete_artifacts() {
    let world = World::new(vec![scenario_with_target(1)]);
    world.put_active_config(&single_model_config(5));

    let outcome = world.plan(false);
    assert_eq!(outcome.runs_created, 1);
    assert_eq!(outcome.enqueued, 1);
    assert_eq!(outcome.enqueue_failures, 0);
    world.drain();

    let run = only_run(&world);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.turn_count_actual, 1);
    assert_eq!(run.turn_count_target, 1);

    let turns = world.turns(&run.run_id);
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].ai_text, "What do you think?");
    assert_eq!(turns[0].input_token_count, 50);
    assert_eq!(turns[0].output_token_count, 5);
    assert_eq!(turns[0].latency_ms, 100);

    let judgments = world.judgments(&run.run_id);
    assert_eq!(judgments.len(), 1);
    assert_eq!(judgments[0].rubric_scores[&DimensionName::new("questioning")], 1.0);
    assert_eq!(judgments[0].judge_model_id.as_str(), JUDGE_MODEL);
    assert!(judgments[0].error.is_none());

    let summary = world.summary(&run.run_id).expect("summary");
    assert!(close(summary.dimension_stats[&DimensionName::new("questioning")].mean, 1.0));
    assert!(close(summary.compliance_rate, 1.0));
    assert_eq!(summary.first_failure_turn, 1);
    assert_eq!(summary.total_output_tokens, 5);

    let aggregate =
        world.aggregate(&world.period_key(), &ModelId::new(MODEL)).expect("aggregate");
    assert_eq!(aggregate.run_count, 1);
    assert!(close(aggregate.dimension_means[&DimensionName::new("questioning")], 1.0));

    let snapshot = world.metrics_snapshot();
    assert!(snapshot.completion_signals >= 1);
    assert!(snapshot.curations >= 1);
}

// ============================================================================
// SECTION: Redelivery Idempotence
// ============================================================================

#[test]
fn redelivered_messages_do_not_duplicate_state() {
    let world = World::new(vec![scenario_with_target(1)]);
    world.put_active_config(&single_model_config(5));
    let _ = world.plan(false);

    let delivery = world.next_run_job().expect("run job");
    world.dialogue_queue.ack(delivery.receipt).expect("ack planner enqueue");

    // The dialogue message is delivered three times.
    for _redelivery in 0..3 {
        world.deliver_run_job(&delivery.payload).expect("runner handle");
    }

    // The judge message is delivered twice.
    let judge_job = JudgeJob {
        run_id: delivery.payload.run_id.clone(),
        turn_index: 0,
    };
    world.deliver_judge_job(&judge_job).expect("first judge delivery");
    world.deliver_judge_job(&judge_job).expect("second judge delivery");

    world.drain();

    let run_id = &delivery.payload.run_id;
    assert_eq!(world.turns(run_id).len(), 1);
    assert_eq!(world.judgments(run_id).len(), 1);
    assert!(world.summary(run_id).is_some());

    let aggregate =
        world.aggregate(&world.period_key(), &ModelId::new(MODEL)).expect("aggregate");
    assert_eq!(aggregate.run_count, 1);
}

// ============================================================================
// SECTION: Planner Re-Trigger
// ============================================================================

#[test]
fn retriggered_planner_reuses_manifest_and_runs() {
    let world = World::new(vec![scenario_with_target(1)]);
    world.put_active_config(&single_model_config(5));

    let first = world.plan(false);
    assert_eq!(first.runs_created, 1);

    // Later trigger within the same period, same configuration.
    world.clock.advance_millis(60_000);
    let second = world.plan(false);

    assert_eq!(first.manifest_id, second.manifest_id);
    assert_eq!(second.runs_created, 0);
    assert_eq!(second.runs_existing, 1);
    assert_eq!(second.enqueued, 0);

    let runs = world.runs_for_model(&ModelId::new(MODEL));
    assert_eq!(runs.len(), 1);
}

// ============================================================================
// SECTION: Partial Failure Then Recovery
// ============================================================================

#[test]
fn failed_run_resumes_from_first_missing_turn() {
    let world = World::new(vec![scenario_with_target(3)]);
    world.put_active_config(&single_model_config(5));
    let _ = world.plan(false);

    // Second candidate invocation (turn index 1, first attempt) fails.
    world.invoker.fail_transiently_on_calls(MODEL, vec![2]);

    let delivery = world.next_run_job().expect("run job");
    world.dialogue_queue.ack(delivery.receipt).expect("ack planner enqueue");
    let job = delivery.payload;

    let err = world.deliver_run_job(&job).unwrap_err();
    assert!(err.is_transient());

    let run = world.run(&job.run_id).expect("run record");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.is_some());
    assert_eq!(world.turns(&job.run_id).len(), 1, "turn 0 persisted, turn 1 absent");
    assert!(world.judgment_queue.depth().expect("judge depth") >= 1);

    // Redelivery resumes from the first missing turn without re-invoking
    // the model for turn 0.
    world.deliver_run_job(&job).expect("redelivered runner handle");
    assert_eq!(world.invoker.call_count(MODEL), 4);

    world.drain();

    let run = world.run(&job.run_id).expect("run record");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.turn_count_actual, 3);
    assert_eq!(world.turns(&job.run_id).len(), 3);
    assert_eq!(world.judgments(&job.run_id).len(), 3);
}

// ============================================================================
// SECTION: Completion Race and Duplicate Signals
// ============================================================================

#[test]
fn out_of_order_judging_detects_completion_once_and_curation_is_idempotent() {
    let world = World::new(vec![scenario_with_target(2)]);
    world.put_active_config(&single_model_config(5));
    let _ = world.plan(false);

    let delivery = world.next_run_job().expect("run job");
    world.dialogue_queue.ack(delivery.receipt).expect("ack planner enqueue");
    let job = delivery.payload;
    world.deliver_run_job(&job).expect("runner handle");

    // Drop the queued judge jobs; judging is driven explicitly out of order.
    while let Some(queued) =
        world.judgment_queue.receive(Duration::from_millis(5)).expect("judge receive")
    {
        world.judgment_queue.ack(queued.receipt).expect("judge ack");
    }

    world
        .deliver_judge_job(&JudgeJob {
            run_id: job.run_id.clone(),
            turn_index: 1,
        })
        .expect("judge turn 1");
    assert_eq!(world.metrics_snapshot().completion_signals, 0);

    world
        .deliver_judge_job(&JudgeJob {
            run_id: job.run_id.clone(),
            turn_index: 0,
        })
        .expect("judge turn 0");
    assert_eq!(world.metrics_snapshot().completion_signals, 1);

    // Duplicate signal deliveries converge byte for byte.
    let signal = RunJudgedSignal {
        run_id: job.run_id.clone(),
        force: false,
    };
    assert_eq!(world.deliver_signal(&signal).expect("first curation"), CurationOutcome::Curated);
    let first_bytes = world.curated_run_bytes(&job.run_id).expect("curated artifact");
    let first_aggregate =
        world.aggregate(&world.period_key(), &ModelId::new(MODEL)).expect("aggregate");

    assert_eq!(world.deliver_signal(&signal).expect("second curation"), CurationOutcome::Curated);
    let second_bytes = world.curated_run_bytes(&job.run_id).expect("curated artifact");
    let second_aggregate =
        world.aggregate(&world.period_key(), &ModelId::new(MODEL)).expect("aggregate");

    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first_aggregate, second_aggregate);
    assert_eq!(second_aggregate.run_count, 1);
}

// ============================================================================
// SECTION: Mixed-Compliance Aggregation
// ============================================================================

/// Seeds a completed run with the given questioning scores directly into the
/// stores, bypassing the runner so the scores are exact.
fn seed_run(world: &World, run_id: &str, scores: &[f64]) -> RunId {
    let run_id = RunId::new(run_id);
    let created_at = Timestamp::from_unix_millis(EPOCH_MS);
    let turn_count = u32::try_from(scores.len()).expect("turn count");
    let run = RunRecord {
        run_id: run_id.clone(),
        manifest_id: ManifestId::new("seeded-manifest"),
        model_id: ModelId::new(MODEL),
        scenario_id: ScenarioId::new("seeded-scenario"),
        rubric_version: RubricVersion::new("socratic-v1"),
        status: RunStatus::Completed,
        turn_count_target: turn_count,
        turn_count_actual: turn_count,
        created_at,
        updated_at: created_at,
        error: None,
    };
    world.index.create(&catalog::encode_run(&run).expect("encode run")).expect("create run");

    for (index, score) in scores.iter().enumerate() {
        let turn_index = u32::try_from(index).expect("turn index");
        let turn = TurnRecord {
            run_id: run_id.clone(),
            turn_index,
            student_text: "seeded student".to_string(),
            ai_text: "What do you think?".to_string(),
            input_token_count: 10,
            output_token_count: 5,
            latency_ms: 50,
            created_at,
            blob_pointer: catalog::turn_blob_path(&run_id, turn_index),
        };
        let bytes = canonical_json_bytes(&turn).expect("turn bytes");
        world.blobs.put(&turn.blob_pointer, &bytes).expect("turn blob");
        world.index.create(&catalog::encode_turn(&turn).expect("encode turn")).expect("turn");

        let judgment = JudgmentRecord {
            run_id: run_id.clone(),
            turn_index,
            rubric_scores: BTreeMap::from([
                (DimensionName::new("questioning"), *score),
                (DimensionName::new("openness"), 0.5),
                (DimensionName::new("non_directiveness"), 1.0),
                (DimensionName::new("brevity"), 1.0),
            ]),
            boolean_scores: BTreeMap::new(),
            heuristic_features: HeuristicFeatures {
                ends_with_question: true,
                question_count: 1,
                word_count: 4,
                open_prompt_count: 1,
                directive_count: 0,
                well_formed: true,
            },
            judge_model_id: ModelId::new(JUDGE_MODEL),
            judge_latency_ms: 0,
            created_at,
            error: None,
            blob_pointer: catalog::judgment_blob_path(&run_id, turn_index),
        };
        let bytes = canonical_json_bytes(&judgment).expect("judgment bytes");
        world.blobs.put(&judgment.blob_pointer, &bytes).expect("judgment blob");
        world
            .index
            .create(&catalog::encode_judgment(&judgment).expect("encode judgment"))
            .expect("judgment");
    }
    run_id
}

#[test]
fn mixed_compliance_runs_aggregate_into_expected_weekly_means() {
    let world = World::new(vec![scenario_with_target(1)]);

    let run_a = seed_run(&world, "seeded-run-a", &[0.9, 0.9, 0.2]);
    let run_b = seed_run(&world, "seeded-run-b", &[0.8, 0.6]);

    for run_id in [&run_a, &run_b] {
        let outcome = world
            .deliver_signal(&RunJudgedSignal {
                run_id: (*run_id).clone(),
                force: false,
            })
            .expect("curation");
        assert_eq!(outcome, CurationOutcome::Curated);
    }

    let summary_a = world.summary(&run_a).expect("summary a");
    assert!(close(summary_a.dimension_stats[&DimensionName::new("questioning")].mean, 2.0 / 3.0));
    assert!(close(summary_a.compliance_rate, 2.0 / 3.0));
    assert_eq!(summary_a.first_failure_turn, 2);

    let summary_b = world.summary(&run_b).expect("summary b");
    assert!(close(summary_b.dimension_stats[&DimensionName::new("questioning")].mean, 0.7));
    assert!(close(summary_b.compliance_rate, 1.0));
    assert_eq!(summary_b.first_failure_turn, 2);

    let aggregate =
        world.aggregate(&world.period_key(), &ModelId::new(MODEL)).expect("aggregate");
    assert_eq!(aggregate.run_count, 2);
    assert!(close(
        aggregate.dimension_means[&DimensionName::new("questioning")],
        (2.0 / 3.0 + 0.7) / 2.0
    ));
    assert!(close(aggregate.compliance_mean, (2.0 / 3.0 + 1.0) / 2.0));
}
