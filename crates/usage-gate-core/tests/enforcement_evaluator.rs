// crates/usage-gate-core/tests/enforcement_evaluator.rs
// ============================================================================
// Module: Enforcement Evaluator Tests
// Description: Hysteresis state machine over usage, thresholds, and history.
// Purpose: Validate state transitions, grace-window pinning, suspension
//          precedence, and fail-open behavior.
// ============================================================================

//! ## Overview
//! Integration-style tests for the enforcement evaluator:
//! - ACTIVE/WARN classification against thresholds
//! - Fresh GRACE entry with a pinned deadline
//! - Grace clock never restarting under continued overage
//! - GRACE expiring into DEGRADED, and DEGRADED holding while triggered
//! - Suspension overriding everything
//! - Fail-open to ACTIVE when usage data is unavailable
//! - Staleness deadlines per state

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;

use usage_gate_core::BillingInterval;
use usage_gate_core::EnforcementConfig;
use usage_gate_core::EnforcementConfigOverride;
use usage_gate_core::EnforcementEvaluator;
use usage_gate_core::EnforcementState;
use usage_gate_core::EnforcementStateStore;
use usage_gate_core::EvaluateError;
use usage_gate_core::EvaluatorSettings;
use usage_gate_core::InMemoryEnforcementStateStore;
use usage_gate_core::InMemoryPlanStore;
use usage_gate_core::InMemorySubscriptionStore;
use usage_gate_core::InMemoryUsageStore;
use usage_gate_core::MeterKey;
use usage_gate_core::PeriodWindow;
use usage_gate_core::Plan;
use usage_gate_core::PlanId;
use usage_gate_core::PlanLimits;
use usage_gate_core::QuotaOverride;
use usage_gate_core::StoreError;
use usage_gate_core::Subscription;
use usage_gate_core::SubscriptionId;
use usage_gate_core::SubscriptionStatus;
use usage_gate_core::TenantId;
use usage_gate_core::Timestamp;
use usage_gate_core::TriggerLevel;
use usage_gate_core::UsageStore;

/// Billing period start used across fixtures.
const PERIOD_START: i64 = 1_700_000_000_000;
/// Billing period end used across fixtures (30 days later).
const PERIOD_END: i64 = PERIOD_START + 30 * 24 * 60 * 60 * 1_000;
/// Evaluation instant inside the billing period.
const NOW: i64 = PERIOD_START + 60 * 60 * 1_000;
/// One hour in milliseconds.
const HOUR_MS: i64 = 60 * 60 * 1_000;

/// Plan fixture with a single enforcement-relevant limit on logs.
fn plan() -> Plan {
    Plan {
        id: PlanId::new("plan-free"),
        name: "free".to_string(),
        display_name: "Free".to_string(),
        price_cents: 0,
        currency: "USD".to_string(),
        interval: BillingInterval::Month,
        retention_days: Some(30),
        limits: PlanLimits {
            max_logs: Some(100),
            max_devices: Some(10),
            ..PlanLimits::default()
        },
        enforcement: None,
    }
}

/// Active subscription fixture for the plan.
fn subscription(tenant_id: &TenantId, plan: &Plan) -> Subscription {
    Subscription {
        id: SubscriptionId::new("sub-1"),
        tenant_id: tenant_id.clone(),
        plan_id: plan.id.clone(),
        status: SubscriptionStatus::Active,
        enabled: true,
        current_period_start: Timestamp::from_unix_millis(PERIOD_START),
        current_period_end: Timestamp::from_unix_millis(PERIOD_END),
        quota_overrides: BTreeMap::new(),
    }
}

/// Test harness wiring the in-memory stores into an evaluator.
struct Harness {
    /// Tenant under test.
    tenant: TenantId,
    /// Subscription store, exposed so tests can swap the subscription.
    subscriptions: InMemorySubscriptionStore,
    /// Usage store for recording events.
    usage: InMemoryUsageStore,
    /// Enforcement state store shared with the evaluator.
    states: InMemoryEnforcementStateStore,
    /// Evaluator under test.
    evaluator: EnforcementEvaluator<
        InMemorySubscriptionStore,
        InMemoryPlanStore,
        InMemoryUsageStore,
        InMemoryEnforcementStateStore,
    >,
}

/// Builds a harness for one tenant, applying edits to the fixtures first.
fn harness(edit: impl FnOnce(&mut Subscription, &mut Plan)) -> Harness {
    let tenant = TenantId::new("tenant-a");
    let mut plan = plan();
    let mut sub = subscription(&tenant, &plan);
    edit(&mut sub, &mut plan);

    let subscriptions = InMemorySubscriptionStore::new();
    subscriptions.put(sub).unwrap();
    let plans = InMemoryPlanStore::new();
    plans.put(plan).unwrap();
    let usage = InMemoryUsageStore::new();
    let states = InMemoryEnforcementStateStore::new();
    let evaluator = EnforcementEvaluator::new(
        subscriptions.clone(),
        plans,
        usage.clone(),
        states.clone(),
    );
    Harness {
        tenant,
        subscriptions,
        usage,
        states,
        evaluator,
    }
}

/// Records `count` log events inside the billing period.
fn record_logs(harness: &Harness, count: u64) {
    harness
        .usage
        .record_many(&harness.tenant, MeterKey::Logs, Timestamp::from_unix_millis(NOW), count)
        .unwrap();
}

#[test]
fn healthy_usage_stays_active() {
    let h = harness(|_, _| {});
    record_logs(&h, 50);

    let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();

    assert_eq!(eval.state, EnforcementState::Active);
    assert!(eval.triggered_meters.is_empty());
    assert_eq!(eval.grace_ends_at, None);
}

#[test]
fn warn_threshold_crossing_yields_warn_with_trigger() {
    let h = harness(|_, _| {});
    record_logs(&h, 80);

    let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();

    assert_eq!(eval.state, EnforcementState::Warn);
    assert_eq!(eval.triggered_meters.len(), 1);
    let trigger = &eval.triggered_meters[0];
    assert_eq!(trigger.meter, MeterKey::Logs);
    assert_eq!(trigger.used, 80);
    assert_eq!(trigger.limit, 100);
    assert_eq!(trigger.level, TriggerLevel::Warn);
}

#[test]
fn hard_threshold_crossing_enters_grace_with_pinned_deadline() {
    let h = harness(|_, _| {});
    record_logs(&h, 100);

    let now = Timestamp::from_unix_millis(NOW);
    let eval = h.evaluator.evaluate(&h.tenant, now).unwrap();

    assert_eq!(eval.state, EnforcementState::Grace);
    assert_eq!(eval.grace_ends_at, Some(now.add_hours(48)));
    assert_eq!(eval.triggered_meters[0].level, TriggerLevel::Hard);
}

#[test]
fn grace_deadline_does_not_restart_under_continued_overage() {
    let h = harness(|_, _| {});
    record_logs(&h, 100);

    let first = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();
    h.states.upsert(&h.tenant, &first).unwrap();

    // More overage an hour later; the original deadline holds.
    record_logs(&h, 20);
    let later = Timestamp::from_unix_millis(NOW + HOUR_MS);
    let second = h.evaluator.evaluate(&h.tenant, later).unwrap();

    assert_eq!(second.state, EnforcementState::Grace);
    assert_eq!(second.grace_ends_at, first.grace_ends_at);
}

#[test]
fn grace_expiry_degrades_and_degraded_holds_while_triggered() {
    let h = harness(|_, _| {});
    record_logs(&h, 100);

    let first = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();
    h.states.upsert(&h.tenant, &first).unwrap();

    let past_deadline = Timestamp::from_unix_millis(NOW + 49 * HOUR_MS);
    let second = h.evaluator.evaluate(&h.tenant, past_deadline).unwrap();
    assert_eq!(second.state, EnforcementState::Degraded);
    assert_eq!(second.grace_ends_at, None);
    h.states.upsert(&h.tenant, &second).unwrap();

    // Still over the hard threshold: DEGRADED holds, no fresh grace window.
    let third =
        h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW + 50 * HOUR_MS)).unwrap();
    assert_eq!(third.state, EnforcementState::Degraded);
    assert_eq!(third.grace_ends_at, None);
}

#[test]
fn dropping_below_hard_threshold_recovers_without_history() {
    let h = harness(|_, _| {});
    record_logs(&h, 100);

    // Degrade the tenant fully.
    let first = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();
    h.states.upsert(&h.tenant, &first).unwrap();
    let degraded =
        h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW + 49 * HOUR_MS)).unwrap();
    assert_eq!(degraded.state, EnforcementState::Degraded);
    h.states.upsert(&h.tenant, &degraded).unwrap();

    // An upgrade raises the limit; usage drops to 50% and the state
    // recomputes fresh, with no sticky triggered bit.
    let mut upgraded = subscription(&h.tenant, &plan());
    upgraded.quota_overrides.insert(MeterKey::Logs, QuotaOverride::Limit(200));
    h.subscriptions.put(upgraded).unwrap();

    let eval =
        h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW + 50 * HOUR_MS)).unwrap();
    assert_eq!(eval.state, EnforcementState::Active);
}

#[test]
fn disabled_subscription_is_suspended_regardless_of_usage() {
    let h = harness(|sub, _| sub.enabled = false);
    record_logs(&h, 1);

    let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();

    assert_eq!(eval.state, EnforcementState::Suspended);
    assert_eq!(eval.grace_ends_at, None);
}

#[test]
fn inactive_status_is_suspended() {
    for status in [
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Expired,
        SubscriptionStatus::Cancelled,
    ] {
        let h = harness(|sub, _| sub.status = status);
        let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();
        assert_eq!(eval.state, EnforcementState::Suspended, "status {status:?}");
    }
}

#[test]
fn trialing_status_counts_as_active() {
    let h = harness(|sub, _| sub.status = SubscriptionStatus::Trialing);
    record_logs(&h, 10);

    let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();

    assert_eq!(eval.state, EnforcementState::Active);
}

#[test]
fn plan_override_tightens_the_warn_threshold() {
    let h = harness(|_, plan| {
        plan.enforcement = Some(EnforcementConfigOverride {
            warn_threshold: Some(50.0),
            ..EnforcementConfigOverride::default()
        });
    });
    record_logs(&h, 60);

    let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();

    assert_eq!(eval.state, EnforcementState::Warn);
}

#[test]
fn overage_buffer_shifts_the_hard_threshold() {
    let h = harness(|_, plan| {
        plan.enforcement = Some(EnforcementConfigOverride {
            overage_buffer_percent: Some(10.0),
            ..EnforcementConfigOverride::default()
        });
    });
    // 105% is past the base hard threshold but inside the buffer.
    record_logs(&h, 105);

    let eval = h.evaluator.evaluate(&h.tenant, Timestamp::from_unix_millis(NOW)).unwrap();

    assert_eq!(eval.state, EnforcementState::Warn);
    assert_eq!(eval.grace_ends_at, None);
}

#[test]
fn staleness_deadlines_follow_the_state() {
    let now = Timestamp::from_unix_millis(NOW);

    let active = harness(|_, _| {});
    let eval = active.evaluator.evaluate(&active.tenant, now).unwrap();
    assert_eq!(eval.next_evaluation_at, now.add_minutes(15));

    let suspended = harness(|sub, _| sub.enabled = false);
    let eval = suspended.evaluator.evaluate(&suspended.tenant, now).unwrap();
    assert_eq!(eval.next_evaluation_at, now.add_minutes(5));
}

#[test]
fn custom_settings_change_the_deadlines() {
    let tenant = TenantId::new("tenant-a");
    let plan = plan();
    let sub = subscription(&tenant, &plan);
    let subscriptions = InMemorySubscriptionStore::new();
    subscriptions.put(sub).unwrap();
    let plans = InMemoryPlanStore::new();
    plans.put(plan).unwrap();
    let evaluator = EnforcementEvaluator::with_settings(
        subscriptions,
        plans,
        InMemoryUsageStore::new(),
        InMemoryEnforcementStateStore::new(),
        EnforcementConfig::default(),
        EvaluatorSettings {
            active_interval_minutes: 1,
            elevated_interval_minutes: 1,
        },
    );

    let now = Timestamp::from_unix_millis(NOW);
    let eval = evaluator.evaluate(&tenant, now).unwrap();
    assert_eq!(eval.next_evaluation_at, now.add_minutes(1));
}

// ============================================================================
// SECTION: Failure Handling
// ============================================================================

/// Usage store that always fails, for fail-open tests.
#[derive(Debug, Clone)]
struct FailingUsageStore;

impl UsageStore for FailingUsageStore {
    fn count(
        &self,
        _tenant_id: &TenantId,
        _meter: MeterKey,
        _window: Option<&PeriodWindow>,
    ) -> Result<u64, StoreError> {
        Err(StoreError::Store("usage backend down".to_string()))
    }
}

#[test]
fn unavailable_usage_fails_open_to_active() {
    let tenant = TenantId::new("tenant-a");
    let plan = plan();
    let sub = subscription(&tenant, &plan);
    let subscriptions = InMemorySubscriptionStore::new();
    subscriptions.put(sub).unwrap();
    let plans = InMemoryPlanStore::new();
    plans.put(plan).unwrap();
    let evaluator = EnforcementEvaluator::new(
        subscriptions,
        plans,
        FailingUsageStore,
        InMemoryEnforcementStateStore::new(),
    );

    let now = Timestamp::from_unix_millis(NOW);
    let eval = evaluator.evaluate(&tenant, now).unwrap();

    assert_eq!(eval.state, EnforcementState::Active);
    assert!(eval.triggered_meters.is_empty());
    assert_eq!(eval.next_evaluation_at, now.add_minutes(15));
}

#[test]
fn missing_subscription_is_a_hard_error() {
    let evaluator = EnforcementEvaluator::new(
        InMemorySubscriptionStore::new(),
        InMemoryPlanStore::new(),
        InMemoryUsageStore::new(),
        InMemoryEnforcementStateStore::new(),
    );

    let result = evaluator.evaluate(&TenantId::new("ghost"), Timestamp::from_unix_millis(NOW));

    assert!(matches!(result, Err(EvaluateError::SubscriptionNotFound(_))));
}

#[test]
fn missing_plan_is_a_hard_error() {
    let tenant = TenantId::new("tenant-a");
    let sub = subscription(&tenant, &plan());
    let subscriptions = InMemorySubscriptionStore::new();
    subscriptions.put(sub).unwrap();
    let evaluator = EnforcementEvaluator::new(
        subscriptions,
        InMemoryPlanStore::new(),
        InMemoryUsageStore::new(),
        InMemoryEnforcementStateStore::new(),
    );

    let result = evaluator.evaluate(&tenant, Timestamp::from_unix_millis(NOW));

    assert!(matches!(result, Err(EvaluateError::PlanNotFound(_))));
}
