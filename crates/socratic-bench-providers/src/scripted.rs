// crates/socratic-bench-providers/src/scripted.rs
// ============================================================================
// Module: Scripted Model Invoker
// Description: Deterministic invoker with per-call scripts and fault injection.
// Purpose: Exercise pipeline flows without an upstream model.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! The scripted invoker returns canned responses in call order, per model.
//! Faults can be injected at specific call numbers to exercise redelivery
//! and partial-failure recovery. Requests are recorded so tests can assert
//! on prompt construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use socratic_bench_core::InvocationRequest;
use socratic_bench_core::InvocationResponse;
use socratic_bench_core::InvokerError;
use socratic_bench_core::ModelInvoker;

// ============================================================================
// SECTION: Script Entries
// ============================================================================

/// One scripted response.
///
/// # Invariants
/// - Token counts and latency are reported verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedResponse {
    /// Generated text.
    pub text: String,
    /// Prompt token count.
    pub input_tokens: u64,
    /// Completion token count.
    pub output_tokens: u64,
    /// Reported latency in milliseconds.
    pub latency_ms: u64,
}

impl ScriptedResponse {
    /// Creates a response with the given text and usage numbers.
    #[must_use]
    pub fn new(text: impl Into<String>, input_tokens: u64, output_tokens: u64, latency_ms: u64) -> Self {
        Self {
            text: text.into(),
            input_tokens,
            output_tokens,
            latency_ms,
        }
    }
}

/// Mutable invoker state behind the mutex.
#[derive(Debug, Default)]
struct ScriptState {
    /// Responses per model, consumed in order (last entry repeats).
    scripts: BTreeMap<String, Vec<ScriptedResponse>>,
    /// Fallback response when a model has no script.
    fallback: Option<ScriptedResponse>,
    /// 1-based call numbers (per model) that fail transiently.
    transient_faults: BTreeMap<String, Vec<u64>>,
    /// Calls observed per model.
    call_counts: BTreeMap<String, u64>,
    /// Recorded requests in call order.
    requests: Vec<InvocationRequest>,
}

// ============================================================================
// SECTION: Invoker
// ============================================================================

/// Deterministic scripted [`ModelInvoker`].
///
/// # Invariants
/// - Responses for a model are served in script order; the final entry
///   repeats for further calls.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    /// Shared script state.
    state: Mutex<ScriptState>,
}

impl ScriptedInvoker {
    /// Creates an empty invoker; models without scripts fail until a
    /// fallback is set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an invoker answering every model with one fixed response.
    #[must_use]
    pub fn fixed(response: ScriptedResponse) -> Self {
        let invoker = Self::new();
        invoker.set_fallback(response);
        invoker
    }

    /// Sets the script for one model.
    pub fn script(&self, model_id: impl Into<String>, responses: Vec<ScriptedResponse>) {
        if let Ok(mut state) = self.state.lock() {
            state.scripts.insert(model_id.into(), responses);
        }
    }

    /// Sets the fallback response for models without scripts.
    pub fn set_fallback(&self, response: ScriptedResponse) {
        if let Ok(mut state) = self.state.lock() {
            state.fallback = Some(response);
        }
    }

    /// Injects transient faults at the given 1-based call numbers for a model.
    pub fn fail_transiently_on_calls(&self, model_id: impl Into<String>, calls: Vec<u64>) {
        if let Ok(mut state) = self.state.lock() {
            state.transient_faults.insert(model_id.into(), calls);
        }
    }

    /// Returns the recorded requests so far.
    #[must_use]
    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.state.lock().map_or_else(|_poisoned| Vec::new(), |state| state.requests.clone())
    }

    /// Returns the number of calls observed for a model.
    #[must_use]
    pub fn call_count(&self, model_id: &str) -> u64 {
        self.state
            .lock()
            .map_or(0, |state| state.call_counts.get(model_id).copied().unwrap_or(0))
    }
}

impl ModelInvoker for ScriptedInvoker {
    fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_poisoned| InvokerError::Transport("script mutex poisoned".to_string()))?;

        let model = request.model_id.as_str().to_string();
        let call_number = {
            let counter = state.call_counts.entry(model.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        state.requests.push(request.clone());

        if let Some(faults) = state.transient_faults.get(&model)
            && faults.contains(&call_number)
        {
            return Err(InvokerError::Transport(format!(
                "injected fault on call {call_number} for {model}"
            )));
        }

        let scripted = state.scripts.get(&model).and_then(|responses| {
            let position = usize::try_from(call_number.saturating_sub(1)).unwrap_or(usize::MAX);
            responses.get(position.min(responses.len().saturating_sub(1))).cloned()
        });
        let response = scripted
            .or_else(|| state.fallback.clone())
            .ok_or_else(|| InvokerError::MissingModel(model))?;

        Ok(InvocationResponse {
            text: response.text,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            latency_ms: response.latency_ms,
        })
    }
}
