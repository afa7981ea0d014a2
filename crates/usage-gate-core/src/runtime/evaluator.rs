// crates/usage-gate-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Usage Gate Enforcement Evaluator
// Description: The hysteresis state machine over usage, config, and history.
// Purpose: Compute the enforcement state, triggers, policy, and next deadline.
// Dependencies: crate::core, crate::interfaces, crate::runtime, tracing
// ============================================================================

//! ## Overview
//! The evaluator recomputes the enforcement state fresh on every call from
//! current usage; there is no sticky "triggered" bit. The one piece of true
//! hysteresis is the grace window: once a tenant crosses the hard threshold
//! the grace deadline is fixed and does not restart on re-evaluation, so the
//! state cannot bounce between DEGRADED and ACTIVE while usage fluctuates
//! around the threshold.
//!
//! Missing usage data fails open to ACTIVE with a full-fidelity policy; a
//! missing subscription or plan is a hard failure the caller decides how to
//! handle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::core::EnforcementConfig;
use crate::core::EnforcementEvaluation;
use crate::core::EnforcementRecord;
use crate::core::EnforcementState;
use crate::core::MeterKey;
use crate::core::Plan;
use crate::core::PlanId;
use crate::core::Subscription;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::TriggerLevel;
use crate::core::TriggeredMeter;
use crate::core::UsageSnapshot;
use crate::interfaces::EnforcementStateStore;
use crate::interfaces::PlanStore;
use crate::interfaces::StoreError;
use crate::interfaces::SubscriptionStore;
use crate::interfaces::UsageStore;
use crate::runtime::policy::effective_policy;
use crate::runtime::quota::resolve_quotas;
use crate::runtime::usage::UsageAggregator;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Default re-evaluation interval for ACTIVE and WARN, in minutes.
pub const DEFAULT_ACTIVE_INTERVAL_MINUTES: u32 = 15;
/// Default re-evaluation interval for GRACE, DEGRADED, and SUSPENDED, in minutes.
pub const DEFAULT_ELEVATED_INTERVAL_MINUTES: u32 = 5;

/// Evaluator timing settings.
///
/// # Invariants
/// - Intervals are minutes and must be nonzero; validation happens at the
///   configuration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorSettings {
    /// Re-evaluation interval while ACTIVE or WARN.
    pub active_interval_minutes: u32,
    /// Re-evaluation interval while GRACE, DEGRADED, or SUSPENDED.
    pub elevated_interval_minutes: u32,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            active_interval_minutes: DEFAULT_ACTIVE_INTERVAL_MINUTES,
            elevated_interval_minutes: DEFAULT_ELEVATED_INTERVAL_MINUTES,
        }
    }
}

impl EvaluatorSettings {
    /// Returns the staleness deadline for a freshly computed state.
    #[must_use]
    pub fn next_evaluation_at(&self, state: EnforcementState, now: Timestamp) -> Timestamp {
        let minutes = if state.is_elevated() {
            self.elevated_interval_minutes
        } else {
            self.active_interval_minutes
        };
        now.add_minutes(i64::from(minutes))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Evaluation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EvaluateError {
    /// No subscription exists for the tenant.
    #[error("no subscription for tenant {0}")]
    SubscriptionNotFound(TenantId),
    /// The subscription references a plan that does not exist.
    #[error("plan {0} not found")]
    PlanNotFound(PlanId),
    /// A storage port failed while resolving the subscription or plan.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Enforcement evaluator over the four storage ports.
#[derive(Debug, Clone)]
pub struct EnforcementEvaluator<S, P, U, E> {
    /// Subscription port.
    subscriptions: S,
    /// Plan port.
    plans: P,
    /// Usage aggregation over the usage port.
    usage: UsageAggregator<U>,
    /// Enforcement state port, read for grace hysteresis.
    states: E,
    /// Installation defaults merged under plan overrides.
    defaults: EnforcementConfig,
    /// Timing settings.
    settings: EvaluatorSettings,
}

impl<S, P, U, E> EnforcementEvaluator<S, P, U, E>
where
    S: SubscriptionStore,
    P: PlanStore,
    U: UsageStore,
    E: EnforcementStateStore,
{
    /// Creates a new evaluator with default config and timing.
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

    /// Creates a new evaluator with explicit defaults and timing.
    #[must_use]
    pub const fn with_settings(
        subscriptions: S,
        plans: P,
        usage: U,
        states: E,
        defaults: EnforcementConfig,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            subscriptions,
            plans,
            usage: UsageAggregator::new(usage),
            states,
            defaults,
            settings,
        }
    }

    /// Evaluates the enforcement state for a tenant at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluateError::SubscriptionNotFound`] or
    /// [`EvaluateError::PlanNotFound`] when the billing inputs are missing,
    /// and [`EvaluateError::Store`] when resolving them fails. Unavailable
    /// usage data is not an error: it fails open to ACTIVE.
    pub fn evaluate(
        &self,
        tenant_id: &TenantId,
        now: Timestamp,
    ) -> Result<EnforcementEvaluation, EvaluateError> {
        let subscription = self
            .subscriptions
            .subscription_for_tenant(tenant_id)?
            .ok_or_else(|| EvaluateError::SubscriptionNotFound(tenant_id.clone()))?;
        let plan = self
            .plans
            .plan(&subscription.plan_id)?
            .ok_or_else(|| EvaluateError::PlanNotFound(subscription.plan_id.clone()))?;
        let config = self.defaults.merged(plan.enforcement.as_ref());

        let quotas = resolve_quotas(&subscription, &plan);
        let usage = match self.usage.aggregate(tenant_id, &quotas, &subscription.period_window()) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "usage unavailable, failing open to ACTIVE");
                return Ok(self.fail_open_evaluation(&config, &plan, now));
            }
        };

        let scan = scan_meters(&usage, &config);
        let previous = match self.states.load(tenant_id) {
            Ok(record) => record,
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "enforcement state unavailable, treating as first evaluation");
                None
            }
        };

        let (state, grace_ends_at) =
            next_state(&subscription, &scan, previous.as_ref(), &config, now);
        if previous.as_ref().is_none_or(|record| record.state != state) {
            debug!(tenant = %tenant_id, state = state.as_str(), "enforcement state transition");
        }

        Ok(EnforcementEvaluation {
            state,
            triggered_meters: scan.triggered,
            effective_policy: effective_policy(state, &config, &plan),
            grace_ends_at,
            evaluated_at: now,
            next_evaluation_at: self.settings.next_evaluation_at(state, now),
        })
    }

    /// Fail-open evaluation used when usage data is unavailable.
    fn fail_open_evaluation(
        &self,
        config: &EnforcementConfig,
        plan: &Plan,
        now: Timestamp,
    ) -> EnforcementEvaluation {
        let state = EnforcementState::Active;
        EnforcementEvaluation {
            state,
            triggered_meters: Vec::new(),
            effective_policy: effective_policy(state, config, plan),
            grace_ends_at: None,
            evaluated_at: now,
            next_evaluation_at: self.settings.next_evaluation_at(state, now),
        }
    }
}

// ============================================================================
// SECTION: Meter Scan
// ============================================================================

/// Outcome of scanning the enforcement meter set against thresholds.
#[derive(Debug, Clone, PartialEq)]
struct MeterScan {
    /// Meters that crossed a threshold, in stable meter order.
    triggered: Vec<TriggeredMeter>,
    /// Whether any meter crossed the effective hard threshold.
    hard_triggered: bool,
    /// Maximum percentage seen across scanned meters.
    max_percentage: f64,
}

/// Scans the enforcement meter subset. Unlimited meters never trigger and
/// report percentage zero.
fn scan_meters(usage: &UsageSnapshot, config: &EnforcementConfig) -> MeterScan {
    let hard_threshold = config.effective_hard_threshold();
    let mut triggered = Vec::new();
    let mut hard_triggered = false;
    let mut max_percentage = 0.0f64;

    for meter in MeterKey::ALL {
        if !meter.enforcement_input() {
            continue;
        }
        let reading = usage.meter(meter);
        let Some(limit) = reading.limit else {
            continue;
        };
        max_percentage = max_percentage.max(reading.percentage);
        let level = if reading.percentage >= hard_threshold {
            hard_triggered = true;
            TriggerLevel::Hard
        } else if reading.percentage >= config.warn_threshold {
            TriggerLevel::Warn
        } else {
            continue;
        };
        triggered.push(TriggeredMeter {
            meter,
            used: reading.used,
            limit,
            percentage: reading.percentage,
            level,
        });
    }

    MeterScan {
        triggered,
        hard_triggered,
        max_percentage,
    }
}

// ============================================================================
// SECTION: State Transition
// ============================================================================

/// Computes the next state and, while in grace, the grace deadline.
///
/// Precedence: SUSPENDED overrides everything; a hard trigger runs the grace
/// window logic; then WARN; then ACTIVE. The grace deadline is fixed at the
/// moment the hard threshold is first crossed and never restarts while the
/// trigger holds.
fn next_state(
    subscription: &Subscription,
    scan: &MeterScan,
    previous: Option<&EnforcementRecord>,
    config: &EnforcementConfig,
    now: Timestamp,
) -> (EnforcementState, Option<Timestamp>) {
    if !subscription.enabled || !subscription.status.is_active() {
        return (EnforcementState::Suspended, None);
    }

    if scan.hard_triggered {
        if let Some(record) = previous {
            if record.state == EnforcementState::Grace {
                if let Some(ends_at) = record.grace_ends_at {
                    if now < ends_at {
                        // Still inside the original window; the clock does
                        // not restart.
                        return (EnforcementState::Grace, Some(ends_at));
                    }
                    return (EnforcementState::Degraded, None);
                }
            }
            if record.state == EnforcementState::Degraded {
                return (EnforcementState::Degraded, None);
            }
        }
        let ends_at = now.add_hours(i64::from(config.grace_period_hours));
        return (EnforcementState::Grace, Some(ends_at));
    }

    if scan.max_percentage >= config.warn_threshold {
        return (EnforcementState::Warn, None);
    }

    (EnforcementState::Active, None)
}
