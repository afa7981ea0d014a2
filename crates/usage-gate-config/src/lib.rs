// crates/usage-gate-config/src/lib.rs
// ============================================================================
// Module: Usage Gate Config Library
// Description: Public API surface for Usage Gate configuration loading.
// Purpose: Expose strict, fail-closed configuration parsing.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Configuration for a Usage Gate installation: enforcement threshold
//! defaults, evaluation intervals, and store paths, loaded from TOML with
//! strict size and bounds validation. Missing or invalid configuration
//! fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::EnforcementDefaults;
pub use config::EvaluationIntervals;
pub use config::GateConfig;
pub use config::MAX_CONFIG_FILE_SIZE;
pub use config::StoreConfig;
