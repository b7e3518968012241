// crates/socratic-bench-core/tests/scoring.rs
// ============================================================================
// Module: Scoring Tests
// Description: Verifies heuristics, rubric domains, and LLM-assisted parsing.
// ============================================================================
//! ## Overview
//! Covers feature extraction, heuristic score dispatch for both rubric
//! generations, score-domain validation, and the strict-parse fallback
//! discipline of the LLM-assisted scorer (neutral scores with an error flag
//! on malformed judge responses; transient invoker failures propagate).

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

use socratic_bench_core::DimensionName;
use socratic_bench_core::InvocationRequest;
use socratic_bench_core::InvocationResponse;
use socratic_bench_core::InvokerError;
use socratic_bench_core::ModelId;
use socratic_bench_core::ModelInvoker;
use socratic_bench_core::Rubric;
use socratic_bench_core::RubricError;
use socratic_bench_core::RubricVersion;
use socratic_bench_core::RunId;
use socratic_bench_core::ScoringMode;
use socratic_bench_core::Timestamp;
use socratic_bench_core::TurnRecord;
use socratic_bench_core::runtime::JudgeBinding;
use socratic_bench_core::runtime::RetryPolicy;
use socratic_bench_core::runtime::extract_features;
use socratic_bench_core::runtime::heuristic_score_set;
use socratic_bench_core::runtime::llm_score_set;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a minimal turn record around the given AI text.
fn turn_with_ai_text(ai_text: &str) -> TurnRecord {
    TurnRecord {
        run_id: RunId::new("01ARZ3NDEKTSV4RRFFQ69G5FAV"),
        turn_index: 0,
        student_text: "Why is one half the same as two quarters?".to_string(),
        ai_text: ai_text.to_string(),
        input_token_count: 50,
        output_token_count: 5,
        latency_ms: 100,
        created_at: Timestamp::from_unix_millis(1_700_000_000_000),
        blob_pointer: "raw/runs/01ARZ3NDEKTSV4RRFFQ69G5FAV/turn_000".to_string(),
    }
}

/// Invoker returning a fixed judge response text.
struct FixedJudge {
    /// Response text served to every call.
    text: String,
}

impl FixedJudge {
    /// Creates a judge stub with the given response.
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl ModelInvoker for FixedJudge {
    fn invoke(&self, _request: &InvocationRequest) -> Result<InvocationResponse, InvokerError> {
        Ok(InvocationResponse {
            text: self.text.clone(),
            input_tokens: 200,
            output_tokens: 20,
            latency_ms: 30,
        })
    }
}

/// Invoker that always times out.
struct TimeoutJudge;

impl ModelInvoker for TimeoutJudge {
    fn invoke(&self, _request: &InvocationRequest) -> Result<InvocationResponse, InvokerError> {
        Err(InvokerError::Timeout("deadline exceeded".to_string()))
    }
}

/// Builds a judge binding over the given invoker without retries.
fn binding<'a>(invoker: &'a dyn ModelInvoker, judge_model: &'a ModelId) -> JudgeBinding<'a> {
    JudgeBinding {
        invoker,
        judge_model_id: judge_model,
        temperature: None,
        deadline: Duration::from_secs(5),
        retry: RetryPolicy::no_retries(),
    }
}

// ============================================================================
// SECTION: Heuristic Features
// ============================================================================

#[test]
fn features_capture_terminal_question() {
    let features = extract_features("What do you think?");
    assert!(features.ends_with_question);
    assert_eq!(features.question_count, 1);
    assert_eq!(features.word_count, 4);
    assert!(features.well_formed);
}

#[test]
fn features_count_open_prompts_and_directives() {
    let features = extract_features(
        "Consider what happens at zero. How would you check it? You should just do the division.",
    );
    assert!(features.open_prompt_count >= 3);
    assert_eq!(features.directive_count, 2);
}

#[test]
fn empty_text_is_not_well_formed() {
    let features = extract_features("   ");
    assert!(!features.well_formed);
    assert_eq!(features.word_count, 0);
}

// ============================================================================
// SECTION: Heuristic Scoring
// ============================================================================

#[test]
fn v1_heuristic_scores_terminal_question_as_full_marks() {
    let rubric = Rubric::socratic_v1();
    let features = extract_features("What do you think?");
    let scores = heuristic_score_set(&rubric, &features);

    assert_eq!(scores.rubric_scores[&DimensionName::new("questioning")], 1.0);
    assert!(scores.error.is_none());
    assert_eq!(scores.judge_latency_ms, 0);
    rubric
        .validate_scores(&scores.rubric_scores, &scores.boolean_scores)
        .expect("scores in domain");
}

#[test]
fn v2_heuristic_scores_cover_boolean_and_count_dimensions() {
    let rubric = Rubric::socratic_v2();
    let features = extract_features("Why? And what if it were negative?");
    let scores = heuristic_score_set(&rubric, &features);

    assert!(scores.boolean_scores[&DimensionName::new("ends_with_question")]);
    assert_eq!(scores.rubric_scores[&DimensionName::new("question_count")], 2.0);
    rubric
        .validate_scores(&scores.rubric_scores, &scores.boolean_scores)
        .expect("scores in domain");
}

#[test]
fn declarative_answer_scores_zero_questioning() {
    let rubric = Rubric::socratic_v1();
    let features = extract_features("The answer is four.");
    let scores = heuristic_score_set(&rubric, &features);
    assert_eq!(scores.rubric_scores[&DimensionName::new("questioning")], 0.0);
}

// ============================================================================
// SECTION: Rubric Domains
// ============================================================================

#[test]
fn validate_rejects_out_of_domain_scores() {
    let rubric = Rubric::socratic_v1();
    let mut scores = heuristic_score_set(&rubric, &extract_features("What?")).rubric_scores;
    scores.insert(DimensionName::new("questioning"), 1.5);
    let err = rubric.validate_scores(&scores, &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, RubricError::OutOfDomain { .. }));
}

#[test]
fn validate_rejects_missing_dimensions() {
    let rubric = Rubric::socratic_v1();
    let err = rubric.validate_scores(&BTreeMap::new(), &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, RubricError::DimensionMismatch(_)));
}

#[test]
fn unknown_rubric_version_is_rejected() {
    let err = Rubric::for_version(&RubricVersion::new("socratic-v9")).unwrap_err();
    assert!(matches!(err, RubricError::UnknownVersion(_)));
}

#[test]
fn llm_suffix_selects_llm_assisted_mode() {
    let rubric = Rubric::for_version(&RubricVersion::new("socratic-v2-llm")).expect("rubric");
    assert_eq!(rubric.scoring_mode(), ScoringMode::LlmAssisted);
    assert_eq!(Rubric::socratic_v2().scoring_mode(), ScoringMode::Heuristic);
}

// ============================================================================
// SECTION: LLM-Assisted Scoring
// ============================================================================

#[test]
fn llm_scorer_accepts_strict_json_response() {
    let judge_model = ModelId::new("judge-large");
    let judge = FixedJudge::new(
        r#"{"ends_with_question": true, "questioning": 0.8, "question_count": 1}"#,
    );
    let rubric = Rubric::for_version(&RubricVersion::new("socratic-v2-llm")).expect("rubric");
    let scores = llm_score_set(&rubric, &turn_with_ai_text("What now?"), &binding(&judge, &judge_model))
        .expect("score set");

    assert!(scores.error.is_none());
    assert_eq!(scores.rubric_scores[&DimensionName::new("questioning")], 0.8);
    assert_eq!(scores.judge_latency_ms, 30);
}

#[test]
fn llm_scorer_accepts_fenced_json_response() {
    let judge_model = ModelId::new("judge-large");
    let judge = FixedJudge::new(
        "```json\n{\"ends_with_question\": false, \"questioning\": 0.2, \"question_count\": 0}\n```",
    );
    let rubric = Rubric::for_version(&RubricVersion::new("socratic-v2-llm")).expect("rubric");
    let scores = llm_score_set(
        &rubric,
        &turn_with_ai_text("The answer is four."),
        &binding(&judge, &judge_model),
    )
    .expect("score set");
    assert!(scores.error.is_none());
    assert_eq!(scores.rubric_scores[&DimensionName::new("questioning")], 0.2);
}

#[test]
fn malformed_judge_response_persists_neutral_scores_with_error() {
    let judge_model = ModelId::new("judge-large");
    let judge = FixedJudge::new("I would rate this a solid seven out of ten.");
    let rubric = Rubric::for_version(&RubricVersion::new("socratic-v2-llm")).expect("rubric");
    let scores = llm_score_set(&rubric, &turn_with_ai_text("What now?"), &binding(&judge, &judge_model))
        .expect("score set");

    assert!(scores.error.is_some());
    assert_eq!(scores.rubric_scores[&DimensionName::new("questioning")], 0.0);
    assert!(!scores.boolean_scores[&DimensionName::new("ends_with_question")]);
}

#[test]
fn out_of_domain_judge_response_persists_neutral_scores_with_error() {
    let judge_model = ModelId::new("judge-large");
    let judge = FixedJudge::new(
        r#"{"ends_with_question": true, "questioning": 7.5, "question_count": 1}"#,
    );
    let rubric = Rubric::for_version(&RubricVersion::new("socratic-v2-llm")).expect("rubric");
    let scores = llm_score_set(&rubric, &turn_with_ai_text("What now?"), &binding(&judge, &judge_model))
        .expect("score set");
    assert!(scores.error.is_some());
}

#[test]
fn transient_judge_failure_propagates() {
    let judge_model = ModelId::new("judge-large");
    let rubric = Rubric::for_version(&RubricVersion::new("socratic-v1-llm")).expect("rubric");
    let err = llm_score_set(
        &rubric,
        &turn_with_ai_text("What now?"),
        &binding(&TimeoutJudge, &judge_model),
    )
    .unwrap_err();
    assert!(err.is_transient());
}
