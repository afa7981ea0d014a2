// crates/usage-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Usage Gate Throttle Gate
// Description: Per-request admission check over quotas and enforcement state.
// Purpose: Gate ingestion writes against hard limits and the tenant's policy.
// Dependencies: crate::core, crate::interfaces, crate::runtime, tracing
// ============================================================================

//! ## Overview
//! The throttle gate runs on the hot path of every ingestion request. It
//! combines the hard per-meter quota check with the subscription-wide
//! enforcement state, refreshing that state lazily when the persisted
//! deadline has passed. Storage failures never block ingestion: the gate
//! logs and fails open.
//!
//! Decision order is deliberate: a specific meter over its limit blocks with
//! an actionable used/limit message even when the subscription as a whole is
//! suspended.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::core::EffectivePolicy;
use crate::core::EnforcementConfig;
use crate::core::EnforcementRecord;
use crate::core::EnforcementState;
use crate::core::MeterKey;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::UsageMeter;
use crate::interfaces::EnforcementStateStore;
use crate::interfaces::PlanStore;
use crate::interfaces::SubscriptionStore;
use crate::interfaces::UsageStore;
use crate::runtime::evaluator::EnforcementEvaluator;
use crate::runtime::evaluator::EvaluatorSettings;
use crate::runtime::quota::resolve_quotas;
use crate::runtime::usage::UsageAggregator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Retry hint in seconds returned with per-meter quota blocks.
pub const QUOTA_RETRY_AFTER_SECS: u64 = 3_600;
/// Error string returned when usage data cannot be resolved.
const USAGE_UNAVAILABLE_ERROR: &str = "Usage stats not available";
/// Error string returned when the subscription is suspended.
const SUSPENDED_ERROR: &str = "Subscription suspended. Please contact support.";

// ============================================================================
// SECTION: Results
// ============================================================================

/// Machine-readable reason for a blocking decision.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThrottleReason {
    /// A specific meter reached its hard limit.
    QuotaExceeded {
        /// The meter that reached its limit.
        meter: MeterKey,
        /// Observed usage count.
        used: u64,
        /// Resolved limit.
        limit: u64,
    },
    /// The subscription is suspended; operator action is required.
    SubscriptionSuspended,
}

/// Outcome of one admission check.
///
/// # Invariants
/// - `reason` and `error` are present exactly when `throttled` is true, or
///   when usage data was unavailable (`error` only, non-fatal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleResult {
    /// Whether the write must be rejected.
    pub throttled: bool,
    /// Machine-readable blocking reason.
    pub reason: Option<ThrottleReason>,
    /// Human-readable message for blocked or degraded-visibility outcomes.
    pub error: Option<String>,
    /// Seconds until retry is sensible, for quota blocks.
    pub retry_after_secs: Option<u64>,
    /// Usage reading for the checked meter, when resolvable.
    pub usage: Option<UsageMeter>,
    /// Enforcement state observed during the check.
    pub state: Option<EnforcementState>,
    /// Policy the caller should apply to the write.
    pub effective_policy: Option<EffectivePolicy>,
}

impl ThrottleResult {
    /// Fail-open result used when usage data is unavailable.
    fn usage_unavailable() -> Self {
        Self {
            throttled: false,
            reason: None,
            error: Some(USAGE_UNAVAILABLE_ERROR.to_string()),
            retry_after_secs: None,
            usage: None,
            state: None,
            effective_policy: None,
        }
    }

    /// Non-throttled result echoing usage and state.
    const fn pass(
        usage: UsageMeter,
        state: EnforcementState,
        effective_policy: Option<EffectivePolicy>,
    ) -> Self {
        Self {
            throttled: false,
            reason: None,
            error: None,
            retry_after_secs: None,
            usage: Some(usage),
            state: Some(state),
            effective_policy,
        }
    }
}

/// Aggregated outcome of checking several meters at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiThrottleResult {
    /// True when any individual check is throttled.
    pub throttled: bool,
    /// Messages from every throttled check.
    pub errors: Vec<String>,
    /// Individual results keyed by meter.
    pub results: BTreeMap<MeterKey, ThrottleResult>,
}

// ============================================================================
// SECTION: Throttle Gate
// ============================================================================

/// Per-request admission gate over the four storage ports.
#[derive(Debug, Clone)]
pub struct ThrottleGate<S, P, U, E> {
    /// Subscription port.
    subscriptions: S,
    /// Plan port.
    plans: P,
    /// Usage aggregation over the usage port.
    usage: UsageAggregator<U>,
    /// Enforcement state port.
    states: E,
    /// Evaluator used for lazy state refresh.
    evaluator: EnforcementEvaluator<S, P, U, E>,
}

impl<S, P, U, E> ThrottleGate<S, P, U, E>
where
    S: SubscriptionStore + Clone,
    P: PlanStore + Clone,
    U: UsageStore + Clone,
    E: EnforcementStateStore + Clone,
{
    /// Creates a gate with default enforcement config and timing.
    #[must_use]
    pub fn new(subscriptions: S, plans: P, usage: U, states: E) -> Self {
        Self::with_settings(
            subscriptions,
            plans,
            usage,
            states,
            EnforcementConfig::default(),
            EvaluatorSettings::default(),
        )
    }

    /// Creates a gate with explicit installation defaults and timing.
    #[must_use]
    pub fn with_settings(
        subscriptions: S,
        plans: P,
        usage: U,
        states: E,
        defaults: EnforcementConfig,
        settings: EvaluatorSettings,
    ) -> Self {
        let evaluator = EnforcementEvaluator::with_settings(
            subscriptions.clone(),
            plans.clone(),
            usage.clone(),
            states.clone(),
            defaults,
            settings,
        );
        Self {
            subscriptions,
            plans,
            usage: UsageAggregator::new(usage),
            states,
            evaluator,
        }
    }

    /// Checks whether a write against one meter is admitted at `now`.
    ///
    /// Storage failures are logged and fail open; the returned result is the
    /// final decision for the caller.
    #[must_use]
    pub fn check(&self, tenant_id: &TenantId, meter: MeterKey, now: Timestamp) -> ThrottleResult {
        let subscription = match self.subscriptions.subscription_for_tenant(tenant_id) {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                // Orphaned usage without a subscription is not an error.
                return ThrottleResult::usage_unavailable();
            }
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "subscription lookup failed, failing open");
                return ThrottleResult::usage_unavailable();
            }
        };
        let plan = match self.plans.plan(&subscription.plan_id) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                warn!(tenant = %tenant_id, plan = %subscription.plan_id, "plan missing, failing open");
                return ThrottleResult::usage_unavailable();
            }
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "plan lookup failed, failing open");
                return ThrottleResult::usage_unavailable();
            }
        };

        let quotas = resolve_quotas(&subscription, &plan);
        let snapshot =
            match self.usage.aggregate(tenant_id, &quotas, &subscription.period_window()) {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(tenant = %tenant_id, %error, "usage aggregation failed, failing open");
                    return ThrottleResult::usage_unavailable();
                }
            };
        let reading = snapshot.meter(meter);

        // Unlimited meters are never throttled; usage is still echoed for
        // observability.
        let Some(limit) = reading.limit else {
            return ThrottleResult::pass(reading, EnforcementState::Active, None);
        };

        let record = self.refreshed_record(tenant_id, now);
        let (state, effective_policy) = record
            .as_ref()
            .map_or((EnforcementState::Active, None), |record| {
                (record.state, Some(record.effective_policy))
            });

        // Hard per-meter gate first: the specific used/limit message beats
        // the subscription-wide suspended message.
        if reading.used >= limit {
            return ThrottleResult {
                throttled: true,
                reason: Some(ThrottleReason::QuotaExceeded {
                    meter,
                    used: reading.used,
                    limit,
                }),
                error: Some(format!(
                    "Quota exceeded: {}/{} {}. Please upgrade your plan.",
                    reading.used,
                    limit,
                    meter.as_str()
                )),
                retry_after_secs: Some(QUOTA_RETRY_AFTER_SECS),
                usage: Some(reading),
                state: Some(state),
                effective_policy,
            };
        }

        if state == EnforcementState::Suspended {
            return ThrottleResult {
                throttled: true,
                reason: Some(ThrottleReason::SubscriptionSuspended),
                error: Some(SUSPENDED_ERROR.to_string()),
                retry_after_secs: None,
                usage: Some(reading),
                state: Some(state),
                effective_policy,
            };
        }

        // DEGRADED admits the write; the surfaced policy tells the caller to
        // apply sampling and retention degradation itself.
        ThrottleResult::pass(reading, state, effective_policy)
    }

    /// Checks several meters and aggregates the outcome.
    #[must_use]
    pub fn check_meters(
        &self,
        tenant_id: &TenantId,
        meters: &[MeterKey],
        now: Timestamp,
    ) -> MultiThrottleResult {
        let mut results = BTreeMap::new();
        let mut errors = Vec::new();
        for meter in meters {
            let result = self.check(tenant_id, *meter, now);
            if result.throttled {
                errors.push(
                    result
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("Quota exceeded for {}", meter.as_str())),
                );
            }
            results.insert(*meter, result);
        }
        MultiThrottleResult {
            throttled: !errors.is_empty(),
            errors,
            results,
        }
    }

    /// Returns the current enforcement record, re-evaluating lazily when the
    /// persisted deadline has passed. Failures fail open to `None`.
    fn refreshed_record(&self, tenant_id: &TenantId, now: Timestamp) -> Option<EnforcementRecord> {
        let cached = match self.states.load(tenant_id) {
            Ok(record) => record,
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "enforcement state load failed, failing open");
                None
            }
        };
        if let Some(record) = &cached {
            if now < record.next_evaluation_at {
                return cached;
            }
        }

        let evaluation = match self.evaluator.evaluate(tenant_id, now) {
            Ok(evaluation) => evaluation,
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "enforcement evaluation failed, failing open");
                return cached;
            }
        };
        match self.states.upsert(tenant_id, &evaluation) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "enforcement state upsert failed, using fresh evaluation");
                Some(cached.map_or_else(
                    || EnforcementRecord::from_evaluation(&evaluation),
                    |mut record| {
                        record.apply(&evaluation);
                        record
                    },
                ))
            }
        }
    }
}
