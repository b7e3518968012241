// crates/socratic-bench-core/src/runtime/scoring.rs
// ============================================================================
// Module: Rubric Scoring
// Description: Heuristic and LLM-assisted scorers dispatched by rubric version.
// Purpose: Produce domain-valid score sets for every judged turn.
// Dependencies: serde_json, crate::core, crate::interfaces, crate::runtime::retry
// ============================================================================

//! ## Overview
//! Scoring has two modes selected by the rubric version. The pure heuristic
//! mode is a deterministic function of the extracted text features. The
//! LLM-assisted mode invokes the judge model with a scoring prompt that
//! demands a strictly structured JSON response; a response that fails strict
//! parsing is persisted as a judgment with an error flag and neutral scores
//! rather than retried, so aggregation always proceeds. Transient invoker
//! failures propagate to the handler and ride the queue's redelivery loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use serde_json::Value;

use crate::core::identifiers::DimensionName;
use crate::core::identifiers::ModelId;
use crate::core::records::HeuristicFeatures;
use crate::core::records::TurnRecord;
use crate::core::rubric::Rubric;
use crate::core::rubric::ScoreType;
use crate::interfaces::ChatMessage;
use crate::interfaces::ChatRole;
use crate::interfaces::InvocationRequest;
use crate::interfaces::InvokerError;
use crate::interfaces::ModelInvoker;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::blocking_sleep;
use crate::runtime::retry::with_retries;

// ============================================================================
// SECTION: Score Sets
// ============================================================================

/// Validated score output for one judged turn.
///
/// # Invariants
/// - Score maps cover exactly the rubric's declared dimensions.
/// - `error` is set iff the scores are the neutral fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSet {
    /// Numeric dimension scores in their native ranges.
    pub rubric_scores: BTreeMap<DimensionName, f64>,
    /// Boolean dimension scores.
    pub boolean_scores: BTreeMap<DimensionName, bool>,
    /// Judge latency in milliseconds (zero for pure heuristic scoring).
    pub judge_latency_ms: u64,
    /// Semantic scoring failure, when the neutral fallback was used.
    pub error: Option<String>,
}

/// Builds the neutral fallback score set for a rubric.
#[must_use]
pub fn neutral_score_set(rubric: &Rubric, error: impl Into<String>) -> ScoreSet {
    let mut rubric_scores = BTreeMap::new();
    let mut boolean_scores = BTreeMap::new();
    for dimension in &rubric.dimensions {
        match dimension.score_type {
            ScoreType::Boolean => {
                boolean_scores.insert(dimension.name.clone(), false);
            }
            ScoreType::Continuous { .. } | ScoreType::Integer { .. } | ScoreType::Count => {
                rubric_scores.insert(dimension.name.clone(), dimension.score_type.neutral());
            }
        }
    }
    ScoreSet {
        rubric_scores,
        boolean_scores,
        judge_latency_ms: 0,
        error: Some(error.into()),
    }
}

// ============================================================================
// SECTION: Heuristic Scoring
// ============================================================================

/// Scores a turn deterministically from its text features.
///
/// Dimensions are dispatched by name; a dimension this scorer does not know
/// receives its neutral value so custom rubric layouts degrade gracefully.
#[must_use]
pub fn heuristic_score_set(rubric: &Rubric, features: &HeuristicFeatures) -> ScoreSet {
    let mut rubric_scores = BTreeMap::new();
    let mut boolean_scores = BTreeMap::new();
    for dimension in &rubric.dimensions {
        match dimension.score_type {
            ScoreType::Boolean => {
                let flag = heuristic_flag(dimension.name.as_str(), features);
                boolean_scores.insert(dimension.name.clone(), flag);
            }
            ScoreType::Continuous { .. } | ScoreType::Integer { .. } | ScoreType::Count => {
                rubric_scores.insert(
                    dimension.name.clone(),
                    heuristic_value(dimension.name.as_str(), dimension.score_type, features),
                );
            }
        }
    }
    ScoreSet {
        rubric_scores,
        boolean_scores,
        judge_latency_ms: 0,
        error: None,
    }
}

/// Heuristic value for a boolean dimension.
fn heuristic_flag(name: &str, features: &HeuristicFeatures) -> bool {
    match name {
        "ends_with_question" => features.ends_with_question,
        "well_formed" => features.well_formed,
        _ => false,
    }
}

/// Heuristic value for a numeric dimension.
fn heuristic_value(name: &str, score_type: ScoreType, features: &HeuristicFeatures) -> f64 {
    match name {
        "questioning" => questioning_score(features),
        "openness" => openness_score(features),
        "non_directiveness" => non_directiveness_score(features),
        "brevity" => brevity_score(features),
        "question_count" => f64::from(features.question_count),
        _ => score_type.neutral(),
    }
}

/// Questioning score: rewards a terminal question, partially rewards any
/// question at all.
fn questioning_score(features: &HeuristicFeatures) -> f64 {
    if features.ends_with_question {
        1.0
    } else if features.question_count > 0 {
        0.6
    } else {
        0.0
    }
}

/// Openness score: saturates after three open-prompt lexicon hits.
fn openness_score(features: &HeuristicFeatures) -> f64 {
    (f64::from(features.open_prompt_count) / 3.0).min(1.0)
}

/// Non-directiveness score: each directive phrase costs half the range.
fn non_directiveness_score(features: &HeuristicFeatures) -> f64 {
    (1.0 - 0.5 * f64::from(features.directive_count)).max(0.0)
}

/// Brevity score: full marks up to 80 words, linear decay to zero at 240.
fn brevity_score(features: &HeuristicFeatures) -> f64 {
    let words = f64::from(features.word_count);
    if words <= 80.0 {
        1.0
    } else {
        ((240.0 - words) / 160.0).clamp(0.0, 1.0)
    }
}

// ============================================================================
// SECTION: LLM-Assisted Scoring
// ============================================================================

/// Judge model binding for LLM-assisted scoring.
///
/// # Invariants
/// - `deadline` bounds each judge invocation.
pub struct JudgeBinding<'a> {
    /// Model invoker used for the judge call.
    pub invoker: &'a dyn ModelInvoker,
    /// Judge model identifier.
    pub judge_model_id: &'a ModelId,
    /// Judge sampling temperature, when configured.
    pub temperature: Option<f64>,
    /// Judge invocation deadline.
    pub deadline: Duration,
    /// In-handler retry policy for transient invoker failures.
    pub retry: RetryPolicy,
}

/// Scores a turn by invoking the judge model with a strict scoring prompt.
///
/// Semantic failures (refusals, malformed or out-of-domain responses) return
/// the neutral fallback with an error flag; they do not propagate.
///
/// # Errors
///
/// Returns [`InvokerError`] only for transient failure classes that exhaust
/// the in-handler retry budget, so the handler fails and the message
/// redelivers.
pub fn llm_score_set(
    rubric: &Rubric,
    turn: &TurnRecord,
    judge: &JudgeBinding<'_>,
) -> Result<ScoreSet, InvokerError> {
    let request = InvocationRequest {
        model_id: judge.judge_model_id.clone(),
        messages: scoring_messages(rubric, turn),
        temperature: judge.temperature,
        max_output_tokens: Some(512),
        deadline: judge.deadline,
    };

    let outcome = with_retries(
        &judge.retry,
        InvokerError::is_transient,
        blocking_sleep,
        |_attempt| judge.invoker.invoke(&request),
    );

    let response = match outcome {
        Ok(response) => response,
        Err(err) if err.is_transient() => return Err(err),
        Err(err) => return Ok(neutral_score_set(rubric, err.to_string())),
    };

    match parse_strict_scores(rubric, &response.text) {
        Ok((rubric_scores, boolean_scores)) => Ok(ScoreSet {
            rubric_scores,
            boolean_scores,
            judge_latency_ms: response.latency_ms,
            error: None,
        }),
        Err(reason) => {
            let mut fallback = neutral_score_set(rubric, reason);
            fallback.judge_latency_ms = response.latency_ms;
            Ok(fallback)
        }
    }
}

/// Builds the scoring prompt demanding a strictly structured response.
fn scoring_messages(rubric: &Rubric, turn: &TurnRecord) -> Vec<ChatMessage> {
    let mut dimension_lines = String::new();
    for dimension in &rubric.dimensions {
        let domain = match dimension.score_type {
            ScoreType::Continuous {
                min,
                max,
            } => format!("number in [{min}, {max}]"),
            ScoreType::Integer {
                low,
                high,
            } => format!("integer in [{low}, {high}]"),
            ScoreType::Boolean => "boolean".to_string(),
            ScoreType::Count => "non-negative integer".to_string(),
        };
        let _ = writeln!(dimension_lines, "- \"{}\": {domain}", dimension.name);
    }

    let system = format!(
        "You evaluate one tutoring reply against a Socratic teaching rubric. \
         Respond with a single JSON object and nothing else. The object must \
         contain exactly these keys:\n{dimension_lines}"
    );
    let user = format!(
        "Student said:\n{}\n\nTutor replied:\n{}\n\nScore the tutor reply.",
        turn.student_text, turn.ai_text
    );
    vec![
        ChatMessage::new(ChatRole::System, system),
        ChatMessage::new(ChatRole::User, user),
    ]
}

/// Parses a judge response into domain-validated score maps.
///
/// The response must be a bare JSON object (a fenced code block is
/// tolerated) whose keys exactly match the rubric's dimensions.
///
/// # Errors
///
/// Returns a human-readable reason when the response is not strictly
/// conformant; callers persist it on the judgment record.
fn parse_strict_scores(
    rubric: &Rubric,
    text: &str,
) -> Result<(BTreeMap<DimensionName, f64>, BTreeMap<DimensionName, bool>), String> {
    let stripped = strip_code_fence(text.trim());
    let value: Value = serde_json::from_str(stripped)
        .map_err(|err| format!("judge response is not valid JSON: {err}"))?;
    let Value::Object(object) = value else {
        return Err("judge response is not a JSON object".to_string());
    };

    let mut rubric_scores = BTreeMap::new();
    let mut boolean_scores = BTreeMap::new();
    for (key, entry) in object {
        let name = DimensionName::new(key);
        match entry {
            Value::Bool(flag) => {
                boolean_scores.insert(name, flag);
            }
            Value::Number(number) => {
                let Some(score) = number.as_f64() else {
                    return Err(format!("dimension {name} has a non-finite score"));
                };
                rubric_scores.insert(name, score);
            }
            _ => return Err(format!("dimension {name} has a non-numeric, non-boolean score")),
        }
    }

    rubric
        .validate_scores(&rubric_scores, &boolean_scores)
        .map_err(|err| format!("judge response failed rubric validation: {err}"))?;
    Ok((rubric_scores, boolean_scores))
}

/// Strips a surrounding Markdown code fence when present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n']).trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
