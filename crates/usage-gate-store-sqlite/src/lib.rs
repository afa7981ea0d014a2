// crates/usage-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Usage Gate SQLite Store Library
// Description: Public API surface for the SQLite-backed storage ports.
// Purpose: Expose the durable store implementation and its configuration.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! SQLite-backed implementations of the Usage Gate storage ports. One WAL
//! database file holds plans, subscriptions, raw usage events, and the
//! per-tenant enforcement records. All four ports are served by a single
//! cloneable handle safe to share across threads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SCHEMA_VERSION;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteStores;
pub use store::SqliteSyncMode;
