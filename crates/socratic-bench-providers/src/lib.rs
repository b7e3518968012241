// crates/socratic-bench-providers/src/lib.rs
// ============================================================================
// Module: Socratic Bench Providers
// Description: Model invokers, scenario registries, and student strategies.
// Purpose: Implement the pipeline's external collaborator interfaces.
// Dependencies: reqwest, serde, serde_json, socratic-bench-core
// ============================================================================

//! ## Overview
//! This crate supplies the pluggable collaborators the core treats as
//! external: model invokers (a deterministic scripted invoker for tests and
//! a blocking HTTP invoker for OpenAI-compatible chat endpoints), an invoker
//! registry that routes by model identifier under an access policy, scenario
//! registries, and the student strategies that synthesize the learner side
//! of multi-turn dialogues.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod http;
mod registry;
mod scenarios;
mod scripted;
mod student;

pub use http::HttpInvoker;
pub use http::HttpInvokerConfig;
pub use registry::InvokerAccessPolicy;
pub use registry::InvokerRegistry;
pub use registry::InvokerRegistryBuilder;
pub use scenarios::StaticScenarioRegistry;
pub use scenarios::load_scenarios_json;
pub use scripted::ScriptedInvoker;
pub use scripted::ScriptedResponse;
pub use student::OpeningStudent;
pub use student::ScriptedStudent;
