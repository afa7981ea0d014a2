// crates/usage-gate-core/src/runtime/policy.rs
// ============================================================================
// Module: Usage Gate Policy Generator
// Description: Derives the effective policy from state, config, and plan.
// Purpose: Keep policy derivation a pure function with no I/O.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Policy generation is a pure function `state × config × plan →
//! effective policy`. ACTIVE, WARN, and GRACE all receive full fidelity;
//! DEGRADED applies the module-rule sampling/retention knobs; SUSPENDED
//! zeroes retention and freezes publishing outright.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::EffectivePolicy;
use crate::core::EnforcementConfig;
use crate::core::EnforcementState;
use crate::core::FreezeDirective;
use crate::core::FreezePolicy;
use crate::core::LogPolicy;
use crate::core::Plan;
use crate::core::RetentionPolicy;
use crate::core::SamplingDirective;
use crate::core::SamplingPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Days subtracted from plan retention for degraded traces/sessions.
const DEGRADED_RETENTION_CUT_DAYS: u32 = 7;
/// Retention floor in days for degraded operation.
const DEGRADED_RETENTION_FLOOR_DAYS: u32 = 7;

// ============================================================================
// SECTION: Policy Generation
// ============================================================================

/// Derives the effective policy for a state.
#[must_use]
pub fn effective_policy(
    state: EnforcementState,
    config: &EnforcementConfig,
    plan: &Plan,
) -> EffectivePolicy {
    match state {
        EnforcementState::Active | EnforcementState::Warn | EnforcementState::Grace => {
            EffectivePolicy::full_fidelity(plan.retention_days_or_default())
        }
        EnforcementState::Degraded => degraded_policy(config, plan),
        EnforcementState::Suspended => suspended_policy(),
    }
}

/// Degraded-operation policy: sampling on, retention cut, publishing frozen
/// per module rules.
fn degraded_policy(config: &EnforcementConfig, plan: &Plan) -> EffectivePolicy {
    let rules = &config.module_rules;
    let retention = plan.retention_days_or_default();
    let stream_retention =
        retention.saturating_sub(DEGRADED_RETENTION_CUT_DAYS).max(DEGRADED_RETENTION_FLOOR_DAYS);
    let log_retention = rules.logs.min_retention_days.max(DEGRADED_RETENTION_FLOOR_DAYS);

    EffectivePolicy {
        sampling: SamplingPolicy {
            api_traces: SamplingDirective::degraded(rules.api_traces.sampling_rate),
            sessions: SamplingDirective::degraded(rules.sessions.sampling_rate),
            logs: LogPolicy {
                // Logs are filtered, not sampled: debug entries drop and
                // crash-adjacent entries keep priority.
                sampling: SamplingDirective::full_fidelity(),
                drop_debug: true,
                prioritize_crashes: rules.logs.prioritize_crashes,
            },
        },
        retention: RetentionPolicy {
            api_traces_days: stream_retention,
            logs_days: log_retention,
            sessions_days: stream_retention,
        },
        freezes: FreezePolicy {
            business_config: freeze_directive(
                rules.business_config.freeze_publishing,
                rules.business_config.serve_last_published,
            ),
            localization: freeze_directive(
                rules.localization.freeze_publishing,
                rules.localization.serve_last_published,
            ),
        },
    }
}

/// Suspended policy: zero retention, sampling off, freezes forced on.
fn suspended_policy() -> EffectivePolicy {
    EffectivePolicy {
        sampling: SamplingPolicy {
            api_traces: SamplingDirective::full_fidelity(),
            sessions: SamplingDirective::full_fidelity(),
            logs: LogPolicy::full_fidelity(),
        },
        retention: RetentionPolicy::uniform(0),
        freezes: FreezePolicy {
            business_config: FreezeDirective::frozen(),
            localization: FreezeDirective::frozen(),
        },
    }
}

/// Builds a freeze directive from module-rule knobs. A frozen module always
/// keeps serving the last published payload.
const fn freeze_directive(frozen: bool, serve_last_published: bool) -> FreezeDirective {
    FreezeDirective {
        frozen,
        serve_last_published: serve_last_published || frozen,
    }
}
