// crates/usage-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Usage Gate Runtime
// Description: Quota resolution, aggregation, evaluation, and admission.
// Purpose: Compose the enforcement engine over the storage ports.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime hosts the engine components: the quota resolver, the usage
//! aggregator, the policy generator, the enforcement evaluator, and the
//! throttle gate, plus in-memory stores for tests and demos.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod evaluator;
pub mod gate;
pub mod policy;
pub mod quota;
pub mod store;
pub mod usage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use evaluator::DEFAULT_ACTIVE_INTERVAL_MINUTES;
pub use evaluator::DEFAULT_ELEVATED_INTERVAL_MINUTES;
pub use evaluator::EnforcementEvaluator;
pub use evaluator::EvaluateError;
pub use evaluator::EvaluatorSettings;
pub use gate::MultiThrottleResult;
pub use gate::QUOTA_RETRY_AFTER_SECS;
pub use gate::ThrottleGate;
pub use gate::ThrottleReason;
pub use gate::ThrottleResult;
pub use policy::effective_policy;
pub use quota::ResolvedQuotas;
pub use quota::resolve_quotas;
pub use store::InMemoryEnforcementStateStore;
pub use store::InMemoryPlanStore;
pub use store::InMemorySubscriptionStore;
pub use store::InMemoryUsageStore;
pub use usage::UsageAggregator;
