// crates/socratic-bench-providers/tests/providers.rs
// ============================================================================
// Module: Provider Tests
// Description: Verifies scripted invoker, registry policy, and strategies.
// ============================================================================
//! ## Overview
//! Exercises the scripted invoker's call-order and fault-injection behavior,
//! the registry's routing and access policy, scenario JSON loading, and the
//! determinism of the student strategies.

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

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use socratic_bench_core::ChatMessage;
use socratic_bench_core::ChatRole;
use socratic_bench_core::InvocationRequest;
use socratic_bench_core::InvokerError;
use socratic_bench_core::ModelId;
use socratic_bench_core::ModelInvoker;
use socratic_bench_core::RunId;
use socratic_bench_core::ScenarioDescriptor;
use socratic_bench_core::ScenarioId;
use socratic_bench_core::ScenarioRegistry;
use socratic_bench_core::StudentStrategy;
use socratic_bench_core::Timestamp;
use socratic_bench_core::TurnRecord;
use socratic_bench_providers::InvokerAccessPolicy;
use socratic_bench_providers::InvokerRegistry;
use socratic_bench_providers::OpeningStudent;
use socratic_bench_providers::ScriptedInvoker;
use socratic_bench_providers::ScriptedResponse;
use socratic_bench_providers::ScriptedStudent;
use socratic_bench_providers::StaticScenarioRegistry;
use socratic_bench_providers::load_scenarios_json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a one-message invocation request for the given model.
fn request_for(model: &str) -> InvocationRequest {
    InvocationRequest {
        model_id: ModelId::new(model),
        messages: vec![ChatMessage::new(ChatRole::User, "Why?")],
        temperature: None,
        max_output_tokens: None,
        deadline: Duration::from_secs(5),
    }
}

/// Builds a scenario descriptor for strategy tests.
fn scenario() -> ScenarioDescriptor {
    ScenarioDescriptor {
        scenario_id: ScenarioId::new("fractions-intro"),
        persona: "A curious student.".to_string(),
        opening_utterance: "Why is one half the same as two quarters?".to_string(),
        turn_count_target: 3,
        rubric_tag: "socratic-core".to_string(),
    }
}

/// Builds a persisted turn with the given index.
fn turn(turn_index: u32) -> TurnRecord {
    TurnRecord {
        run_id: RunId::new("r"),
        turn_index,
        student_text: "student".to_string(),
        ai_text: "What do you think?".to_string(),
        input_token_count: 10,
        output_token_count: 5,
        latency_ms: 10,
        created_at: Timestamp::from_unix_millis(0),
        blob_pointer: format!("raw/runs/r/turn_{turn_index:03}"),
    }
}

// ============================================================================
// SECTION: Scripted Invoker
// ============================================================================

#[test]
fn scripted_invoker_serves_responses_in_order_and_repeats_last() {
    let invoker = ScriptedInvoker::new();
    invoker.script(
        "tutor-small",
        vec![
            ScriptedResponse::new("First?", 10, 2, 5),
            ScriptedResponse::new("Second?", 10, 2, 5),
        ],
    );

    let first = invoker.invoke(&request_for("tutor-small")).expect("first");
    let second = invoker.invoke(&request_for("tutor-small")).expect("second");
    let third = invoker.invoke(&request_for("tutor-small")).expect("third");
    assert_eq!(first.text, "First?");
    assert_eq!(second.text, "Second?");
    assert_eq!(third.text, "Second?");
    assert_eq!(invoker.call_count("tutor-small"), 3);
}

#[test]
fn scripted_invoker_injects_transient_faults() {
    let invoker = ScriptedInvoker::fixed(ScriptedResponse::new("Fine?", 10, 2, 5));
    invoker.fail_transiently_on_calls("tutor-small", vec![2]);

    assert!(invoker.invoke(&request_for("tutor-small")).is_ok());
    let err = invoker.invoke(&request_for("tutor-small")).unwrap_err();
    assert!(err.is_transient());
    assert!(invoker.invoke(&request_for("tutor-small")).is_ok());
}

#[test]
fn scripted_invoker_records_requests() {
    let invoker = ScriptedInvoker::fixed(ScriptedResponse::new("Fine?", 10, 2, 5));
    invoker.invoke(&request_for("tutor-small")).expect("invoke");
    let requests = invoker.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages[0].content, "Why?");
}

#[test]
fn unscripted_model_without_fallback_is_missing() {
    let invoker = ScriptedInvoker::new();
    let err = invoker.invoke(&request_for("unknown")).unwrap_err();
    assert!(matches!(err, InvokerError::MissingModel(_)));
}

// ============================================================================
// SECTION: Registry Policy
// ============================================================================

#[test]
fn registry_routes_by_model_and_applies_policy() {
    let tutor: Arc<dyn ModelInvoker> =
        Arc::new(ScriptedInvoker::fixed(ScriptedResponse::new("Tutor?", 1, 1, 1)));
    let registry = InvokerRegistry::builder()
        .invoker("tutor-small", tutor)
        .policy(InvokerAccessPolicy {
            allowlist: Some(BTreeSet::from(["tutor-small".to_string()])),
            denylist: BTreeSet::new(),
        })
        .build();

    assert_eq!(registry.invoke(&request_for("tutor-small")).expect("allowed").text, "Tutor?");
    let err = registry.invoke(&request_for("other-model")).unwrap_err();
    assert!(matches!(err, InvokerError::Refused(_)));
}

#[test]
fn registry_denylist_overrides_default_invoker() {
    let fallback: Arc<dyn ModelInvoker> =
        Arc::new(ScriptedInvoker::fixed(ScriptedResponse::new("Fallback?", 1, 1, 1)));
    let registry = InvokerRegistry::builder()
        .default_invoker(fallback)
        .policy(InvokerAccessPolicy {
            allowlist: None,
            denylist: BTreeSet::from(["blocked-model".to_string()]),
        })
        .build();

    assert!(registry.invoke(&request_for("anything")).is_ok());
    let err = registry.invoke(&request_for("blocked-model")).unwrap_err();
    assert!(matches!(err, InvokerError::Refused(_)));
}

// ============================================================================
// SECTION: Scenario Registry
// ============================================================================

#[test]
fn static_registry_resolves_known_scenarios() {
    let registry = StaticScenarioRegistry::new(vec![scenario()]);
    let found = registry.get(&ScenarioId::new("fractions-intro")).expect("lookup");
    assert_eq!(found.expect("present").turn_count_target, 3);
    let missing = registry.get(&ScenarioId::new("unknown")).expect("lookup");
    assert!(missing.is_none());
}

#[test]
fn scenario_json_loading_validates_descriptors() {
    let valid = serde_json::to_vec(&vec![scenario()]).expect("serialize");
    let registry = load_scenarios_json(&valid).expect("load");
    assert_eq!(registry.len(), 1);

    let mut zero_turns = scenario();
    zero_turns.turn_count_target = 0;
    let invalid = serde_json::to_vec(&vec![zero_turns]).expect("serialize");
    assert!(load_scenarios_json(&invalid).is_err());
}

// ============================================================================
// SECTION: Student Strategies
// ============================================================================

#[test]
fn scripted_student_is_a_pure_function_of_history() {
    let student = ScriptedStudent::with_default_probes();
    let scenario = scenario();

    let opening = student.next_utterance(&scenario, &[]).expect("opening");
    assert_eq!(opening, scenario.opening_utterance);

    let after_one = student.next_utterance(&scenario, &[turn(0)]).expect("after one");
    let after_one_again = student.next_utterance(&scenario, &[turn(0)]).expect("again");
    assert_eq!(after_one, after_one_again);

    let after_two = student.next_utterance(&scenario, &[turn(0), turn(1)]).expect("after two");
    assert_ne!(after_one, after_two);
}

#[test]
fn scripted_student_rejects_empty_probe_lists() {
    assert!(ScriptedStudent::new(Vec::new()).is_err());
}

#[test]
fn opening_student_always_replays_the_opening_utterance() {
    let student = OpeningStudent;
    let scenario = scenario();
    let first = student.next_utterance(&scenario, &[]).expect("first");
    let later = student.next_utterance(&scenario, &[turn(0), turn(1)]).expect("later");
    assert_eq!(first, scenario.opening_utterance);
    assert_eq!(later, scenario.opening_utterance);
}
