// crates/socratic-bench-pipeline/src/lib.rs
// ============================================================================
// Module: Socratic Bench Pipeline
// Description: Worker harness and host wiring for the benchmark pipeline.
// Purpose: Run the core components over concrete substrates.
// Dependencies: socratic-bench-{core,store-sqlite,blob-fs,queue,providers}
// ============================================================================

//! ## Overview
//! This crate turns the backend-agnostic core into a running host: worker
//! pools with per-component concurrency caps, TOML host configuration, and
//! the wiring that binds stores, queues, the bus, and the collaborators
//! together. The CLI is a thin shell over [`PipelineHost`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod harness;
pub mod host;
pub mod inspect;

pub use harness::HandlerFailure;
pub use harness::JobHandler;
pub use harness::WorkerPool;
pub use harness::WorkerPoolConfig;
pub use host::HostConfig;
pub use host::HostError;
pub use host::InvokerMode;
pub use host::InvokerSettings;
pub use host::PipelineHost;
pub use host::QueueDepths;
pub use host::QueueSettings;
pub use host::WorkerSet;
pub use inspect::RunInspection;
pub use inspect::inspect_run;
