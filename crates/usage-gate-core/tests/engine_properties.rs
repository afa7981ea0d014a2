// crates/usage-gate-core/tests/engine_properties.rs
// ============================================================================
// Module: Engine Property Tests
// Description: Property-based checks over the engine's pure building blocks.
// Purpose: Validate percentage arithmetic, override precedence, and the
//          first-write-wins record merge across arbitrary inputs.
// ============================================================================

//! ## Overview
//! Property tests for the pure pieces of the engine:
//! - Usage percentages scale linearly and are never capped
//! - Quota overrides always win over plan limits
//! - Record merges preserve the original "entered" timestamps
//! - Staleness deadlines always land strictly after the evaluation

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;

use proptest::prelude::Just;
use proptest::prelude::Strategy;
use proptest::prelude::any;
use proptest::prelude::prop;
use proptest::prop_oneof;
use proptest::proptest;
use usage_gate_core::BillingInterval;
use usage_gate_core::EffectivePolicy;
use usage_gate_core::EnforcementEvaluation;
use usage_gate_core::EnforcementRecord;
use usage_gate_core::EnforcementState;
use usage_gate_core::EvaluatorSettings;
use usage_gate_core::MeterKey;
use usage_gate_core::Plan;
use usage_gate_core::PlanId;
use usage_gate_core::PlanLimits;
use usage_gate_core::QuotaOverride;
use usage_gate_core::Subscription;
use usage_gate_core::SubscriptionId;
use usage_gate_core::SubscriptionStatus;
use usage_gate_core::TenantId;
use usage_gate_core::Timestamp;
use usage_gate_core::UsageMeter;
use usage_gate_core::resolve_quotas;

/// Strategy over meter keys.
fn meter_key() -> impl Strategy<Value = MeterKey> {
    prop::sample::select(MeterKey::ALL.to_vec())
}

/// Strategy over enforcement states.
fn enforcement_state() -> impl Strategy<Value = EnforcementState> {
    prop_oneof![
        Just(EnforcementState::Active),
        Just(EnforcementState::Warn),
        Just(EnforcementState::Grace),
        Just(EnforcementState::Degraded),
        Just(EnforcementState::Suspended),
    ]
}

/// Builds a minimal evaluation for record-merge properties.
fn evaluation(state: EnforcementState, at: i64) -> EnforcementEvaluation {
    let evaluated_at = Timestamp::from_unix_millis(at);
    EnforcementEvaluation {
        state,
        triggered_meters: Vec::new(),
        effective_policy: EffectivePolicy::full_fidelity(30),
        grace_ends_at: (state == EnforcementState::Grace)
            .then(|| evaluated_at.add_hours(48)),
        evaluated_at,
        next_evaluation_at: evaluated_at.add_minutes(15),
    }
}

proptest! {
    #[test]
    fn percentage_is_linear_and_uncapped(used in 0u64..10_000_000, limit in 1u64..1_000_000) {
        let reading = UsageMeter::new(used, Some(limit));
        #[allow(clippy::cast_precision_loss, reason = "Bounded test inputs.")]
        let expected = (used as f64) / (limit as f64) * 100.0;
        assert_eq!(reading.percentage, expected);
        if used > limit {
            assert!(reading.percentage > 100.0);
        }
    }

    #[test]
    fn unlimited_and_zero_limits_report_zero_percent(used in 0u64..10_000_000) {
        assert_eq!(UsageMeter::new(used, None).percentage, 0.0);
        assert_eq!(UsageMeter::new(used, Some(0)).percentage, 0.0);
    }

    #[test]
    fn quota_override_always_wins(
        meter in meter_key(),
        plan_limit in prop::option::of(0u64..1_000_000),
        override_limit in 0u64..1_000_000,
        unlimited in any::<bool>(),
    ) {
        let mut limits = PlanLimits::default();
        // Place the plan limit on the chosen meter through the public merge.
        let plan = Plan {
            id: PlanId::new("plan-x"),
            name: "x".to_string(),
            display_name: "X".to_string(),
            price_cents: 0,
            currency: "USD".to_string(),
            interval: BillingInterval::Month,
            retention_days: None,
            limits: {
                set_limit(&mut limits, meter, plan_limit);
                limits
            },
            enforcement: None,
        };
        let tenant = TenantId::new("tenant-p");
        let mut sub = Subscription {
            id: SubscriptionId::new("sub-p"),
            tenant_id: tenant,
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            enabled: true,
            current_period_start: Timestamp::from_unix_millis(0),
            current_period_end: Timestamp::from_unix_millis(1),
            quota_overrides: BTreeMap::new(),
        };
        let expected = if unlimited {
            sub.quota_overrides.insert(meter, QuotaOverride::Unlimited);
            None
        } else {
            sub.quota_overrides.insert(meter, QuotaOverride::Limit(override_limit));
            Some(override_limit)
        };

        let quotas = resolve_quotas(&sub, &plan);
        assert_eq!(quotas.limit(meter), expected);
    }

    #[test]
    fn record_merge_preserves_first_entered_timestamps(
        states in prop::collection::vec(enforcement_state(), 1..12),
    ) {
        let mut record: Option<EnforcementRecord> = None;
        let mut first_warn: Option<Timestamp> = None;
        let mut first_grace: Option<Timestamp> = None;
        let mut first_degraded: Option<Timestamp> = None;

        for (index, state) in states.iter().enumerate() {
            let at = 1_000_000 + (index as i64) * 60_000;
            let eval = evaluation(*state, at);
            match &mut record {
                Some(record) => record.apply(&eval),
                None => record = Some(EnforcementRecord::from_evaluation(&eval)),
            }
            match state {
                EnforcementState::Warn => {
                    first_warn.get_or_insert(eval.evaluated_at);
                }
                EnforcementState::Grace => {
                    first_grace.get_or_insert(eval.evaluated_at);
                }
                EnforcementState::Degraded => {
                    first_degraded.get_or_insert(eval.evaluated_at);
                }
                EnforcementState::Active | EnforcementState::Suspended => {}
            }
        }

        let record = record.unwrap();
        assert_eq!(record.warn_entered_at, first_warn);
        assert_eq!(record.grace_entered_at, first_grace);
        assert_eq!(record.degraded_entered_at, first_degraded);
        assert_eq!(record.state, *states.last().unwrap());
        // The grace deadline only survives while grace is in force.
        if record.state != EnforcementState::Grace {
            assert_eq!(record.grace_ends_at, None);
        }
    }

    #[test]
    fn staleness_deadline_is_strictly_after_now(
        state in enforcement_state(),
        now in 0i64..4_000_000_000_000,
        active_minutes in 1u32..1_440,
        elevated_minutes in 1u32..1_440,
    ) {
        let settings = EvaluatorSettings {
            active_interval_minutes: active_minutes,
            elevated_interval_minutes: elevated_minutes,
        };
        let now = Timestamp::from_unix_millis(now);
        let deadline = settings.next_evaluation_at(state, now);
        assert!(deadline > now);
        let minutes = if state.is_elevated() { elevated_minutes } else { active_minutes };
        assert_eq!(deadline, now.add_minutes(i64::from(minutes)));
    }
}

/// Writes a plan limit for one meter onto the limits struct.
fn set_limit(limits: &mut PlanLimits, meter: MeterKey, value: Option<u64>) {
    match meter {
        MeterKey::Devices => limits.max_devices = value,
        MeterKey::ApiTraces => limits.max_api_traces = value,
        MeterKey::ApiEndpoints => limits.max_api_endpoints = value,
        MeterKey::ApiRequests => limits.max_api_requests = value,
        MeterKey::Logs => limits.max_logs = value,
        MeterKey::Sessions => limits.max_sessions = value,
        MeterKey::Crashes => limits.max_crashes = value,
        MeterKey::Projects => limits.max_projects = value,
        MeterKey::BusinessConfigKeys => limits.max_business_config_keys = value,
        MeterKey::LocalizationLanguages => limits.max_localization_languages = value,
        MeterKey::LocalizationKeys => limits.max_localization_keys = value,
        MeterKey::TeamMembers => limits.max_team_members = value,
        MeterKey::MockEndpoints => limits.max_mock_endpoints = value,
    }
}
