// crates/usage-gate-core/src/core/mod.rs
// ============================================================================
// Module: Usage Gate Core Types
// Description: Canonical meter, plan, configuration, and state structures.
// Purpose: Provide stable, serializable types for usage enforcement.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Usage Gate core types define meters, plans, subscriptions, enforcement
//! configuration, enforcement state, and effective policies. These types are
//! the canonical source of truth for any derived API surfaces.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod config;
pub mod identifiers;
pub mod meter;
pub mod plan;
pub mod policy;
pub mod state;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::DEFAULT_GRACE_PERIOD_HOURS;
pub use config::DEFAULT_HARD_THRESHOLD;
pub use config::DEFAULT_MIN_LOG_RETENTION_DAYS;
pub use config::DEFAULT_OVERAGE_BUFFER_PERCENT;
pub use config::DEFAULT_SAMPLING_RATE;
pub use config::DEFAULT_WARN_THRESHOLD;
pub use config::EnforcementConfig;
pub use config::EnforcementConfigOverride;
pub use config::FreezeRule;
pub use config::LogRules;
pub use config::ModuleName;
pub use config::ModuleRules;
pub use config::SamplingRule;
pub use identifiers::PlanId;
pub use identifiers::SubscriptionId;
pub use identifiers::TenantId;
pub use meter::MeterKey;
pub use meter::MeterWindow;
pub use meter::UsageMeter;
pub use meter::UsageSnapshot;
pub use plan::BillingInterval;
pub use plan::DEFAULT_RETENTION_DAYS;
pub use plan::Plan;
pub use plan::PlanLimits;
pub use plan::QuotaOverride;
pub use plan::Subscription;
pub use plan::SubscriptionStatus;
pub use policy::EffectivePolicy;
pub use policy::FreezeDirective;
pub use policy::FreezePolicy;
pub use policy::LogPolicy;
pub use policy::RetentionPolicy;
pub use policy::SamplingDirective;
pub use policy::SamplingPolicy;
pub use state::EnforcementEvaluation;
pub use state::EnforcementRecord;
pub use state::EnforcementState;
pub use state::TriggerLevel;
pub use state::TriggeredMeter;
pub use time::MILLIS_PER_HOUR;
pub use time::MILLIS_PER_MINUTE;
pub use time::PeriodWindow;
pub use time::Timestamp;
