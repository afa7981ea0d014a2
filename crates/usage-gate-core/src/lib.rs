// crates/usage-gate-core/src/lib.rs
// ============================================================================
// Module: Usage Gate Core Library
// Description: Public API surface for the Usage Gate core.
// Purpose: Expose core types, storage ports, and the runtime engine.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Usage Gate core turns raw per-resource counters into admission-control
//! decisions and degraded-operation policies for a multi-tenant platform.
//! It is backend-agnostic and integrates through explicit storage ports
//! rather than embedding into a persistence layer. The engine never reads
//! wall-clock time; hosts pass `now` into every evaluation and check.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::EnforcementStateStore;
pub use interfaces::PlanStore;
pub use interfaces::StoreError;
pub use interfaces::SubscriptionStore;
pub use interfaces::UsageStore;
pub use runtime::DEFAULT_ACTIVE_INTERVAL_MINUTES;
pub use runtime::DEFAULT_ELEVATED_INTERVAL_MINUTES;
pub use runtime::EnforcementEvaluator;
pub use runtime::EvaluateError;
pub use runtime::EvaluatorSettings;
pub use runtime::InMemoryEnforcementStateStore;
pub use runtime::InMemoryPlanStore;
pub use runtime::InMemorySubscriptionStore;
pub use runtime::InMemoryUsageStore;
pub use runtime::MultiThrottleResult;
pub use runtime::QUOTA_RETRY_AFTER_SECS;
pub use runtime::ResolvedQuotas;
pub use runtime::ThrottleGate;
pub use runtime::ThrottleReason;
pub use runtime::ThrottleResult;
pub use runtime::UsageAggregator;
pub use runtime::effective_policy;
pub use runtime::resolve_quotas;
