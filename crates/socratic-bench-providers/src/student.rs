// crates/socratic-bench-providers/src/student.rs
// ============================================================================
// Module: Student Strategies
// Description: Deterministic student-side utterance synthesis.
// Purpose: Produce the learner half of multi-turn dialogues from history.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! Student strategies are pure functions of the scenario descriptor and the
//! persisted dialogue history, so a resumed run regenerates the identical
//! student utterance for any turn index. The opening strategy suits
//! single-turn scenarios; the scripted strategy cycles a fixed probe list
//! for multi-turn scenarios.

// ============================================================================
// SECTION: Imports
// ============================================================================

use socratic_bench_core::ScenarioDescriptor;
use socratic_bench_core::StudentError;
use socratic_bench_core::StudentStrategy;
use socratic_bench_core::TurnRecord;

// ============================================================================
// SECTION: Default Probes
// ============================================================================

/// Default probe cycle for multi-turn scenarios.
const DEFAULT_PROBES: &[&str] = &[
    "I'm not sure I follow. Can you give me a hint?",
    "Okay, I think I see. Is it because of what we said earlier?",
    "Let me try: does that mean the first part determines the rest?",
    "I still feel stuck on one piece. What am I missing?",
];

// ============================================================================
// SECTION: Opening Strategy
// ============================================================================

/// Strategy that always replays the scenario's opening utterance.
///
/// # Invariants
/// - Suitable for single-turn scenarios only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpeningStudent;

impl StudentStrategy for OpeningStudent {
    fn next_utterance(
        &self,
        scenario: &ScenarioDescriptor,
        _prior_turns: &[TurnRecord],
    ) -> Result<String, StudentError> {
        Ok(scenario.opening_utterance.clone())
    }
}

// ============================================================================
// SECTION: Scripted Strategy
// ============================================================================

/// Strategy cycling a fixed probe list keyed by turn position.
///
/// # Invariants
/// - The utterance for turn `t` depends only on `t` and the probe list.
#[derive(Debug, Clone)]
pub struct ScriptedStudent {
    /// Probe utterances cycled after the opening turn.
    probes: Vec<String>,
}

impl ScriptedStudent {
    /// Creates a strategy with a custom probe list.
    ///
    /// # Errors
    ///
    /// Returns [`StudentError::Strategy`] when the probe list is empty.
    pub fn new(probes: Vec<String>) -> Result<Self, StudentError> {
        if probes.is_empty() {
            return Err(StudentError::Strategy("probe list is empty".to_string()));
        }
        Ok(Self {
            probes,
        })
    }

    /// Creates a strategy with the default probe cycle.
    #[must_use]
    pub fn with_default_probes() -> Self {
        Self {
            probes: DEFAULT_PROBES.iter().map(|probe| (*probe).to_string()).collect(),
        }
    }
}

impl Default for ScriptedStudent {
    fn default() -> Self {
        Self::with_default_probes()
    }
}

impl StudentStrategy for ScriptedStudent {
    fn next_utterance(
        &self,
        scenario: &ScenarioDescriptor,
        prior_turns: &[TurnRecord],
    ) -> Result<String, StudentError> {
        if prior_turns.is_empty() {
            return Ok(scenario.opening_utterance.clone());
        }
        let position = (prior_turns.len() - 1) % self.probes.len();
        Ok(self.probes[position].clone())
    }
}
