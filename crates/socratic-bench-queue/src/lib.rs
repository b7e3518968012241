// crates/socratic-bench-queue/src/lib.rs
// ============================================================================
// Module: Socratic Bench Queues
// Description: In-process durable-semantics queues and signal bus.
// Purpose: Provide the FIFO-with-retry and broadcast substrates.
// Dependencies: serde, serde_json, socratic-bench-core
// ============================================================================

//! ## Overview
//! These adapters implement the core queue and bus interfaces in process
//! with the full durability semantics the pipeline relies on: visibility
//! timeouts, receive counting, dead-letter diversion, and at-least-once
//! broadcast. Messages cross the queue as their JSON wire encodings, so the
//! serialized shapes match what an external queue substrate would carry.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod bus;
mod queue;

pub use bus::MemorySignalBus;
pub use queue::MemoryJobQueue;
pub use queue::QueueConfig;
