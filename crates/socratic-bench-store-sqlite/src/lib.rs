// crates/socratic-bench-store-sqlite/src/lib.rs
// ============================================================================
// Module: Socratic Bench SQLite Store
// Description: Index tier backed by SQLite.
// Purpose: Export the composite-key index store implementation.
// Dependencies: rusqlite, socratic-bench-core
// ============================================================================

//! ## Overview
//! This crate implements the core [`socratic_bench_core::IndexStore`]
//! interface over a single `SQLite` table keyed by (partition key, sort
//! key), with secondary indexes for the model and manifest run queries and a
//! revision column for versioned conditional writes.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;

pub use store::SqliteIndexStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
