// crates/usage-gate-core/src/core/plan.rs
// ============================================================================
// Module: Usage Gate Plans and Subscriptions
// Description: Plan templates, per-meter limits, and tenant subscriptions.
// Purpose: Provide the read-only billing inputs consumed by the engine.
// Dependencies: crate::core::{config, identifiers, meter, time}, serde
// ============================================================================

//! ## Overview
//! A plan is an immutable template carrying per-meter limits, billing
//! price/interval, and optional enforcement-threshold overrides. A
//! subscription binds one tenant to a plan, carries the billing-period
//! bounds, the operator kill-switch, and per-meter quota overrides.
//!
//! Both types are created and mutated by billing/admin flows outside this
//! crate; the engine only reads them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::config::EnforcementConfigOverride;
use crate::core::identifiers::PlanId;
use crate::core::identifiers::SubscriptionId;
use crate::core::identifiers::TenantId;
use crate::core::meter::MeterKey;
use crate::core::time::PeriodWindow;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default retention in days when a plan does not configure one.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Billing interval for a plan.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Billed monthly.
    Month,
    /// Billed yearly.
    Year,
}

/// Per-meter limits configured on a plan.
///
/// # Invariants
/// - `None` means unlimited for that meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Device registrations per billing period.
    pub max_devices: Option<u64>,
    /// API traces per billing period.
    pub max_api_traces: Option<u64>,
    /// Distinct API endpoints per billing period.
    pub max_api_endpoints: Option<u64>,
    /// API requests per billing period.
    pub max_api_requests: Option<u64>,
    /// Log entries per billing period.
    pub max_logs: Option<u64>,
    /// Sessions per billing period.
    pub max_sessions: Option<u64>,
    /// Crash reports per billing period.
    pub max_crashes: Option<u64>,
    /// Total projects.
    pub max_projects: Option<u64>,
    /// Total business-config keys.
    pub max_business_config_keys: Option<u64>,
    /// Total localization languages.
    pub max_localization_languages: Option<u64>,
    /// Total localization keys.
    pub max_localization_keys: Option<u64>,
    /// Distinct team members across all projects.
    pub max_team_members: Option<u64>,
    /// Total mock endpoints.
    pub max_mock_endpoints: Option<u64>,
}

impl PlanLimits {
    /// Returns the configured limit for a meter (`None` = unlimited).
    #[must_use]
    pub const fn limit(&self, meter: MeterKey) -> Option<u64> {
        match meter {
            MeterKey::Devices => self.max_devices,
            MeterKey::ApiTraces => self.max_api_traces,
            MeterKey::ApiEndpoints => self.max_api_endpoints,
            MeterKey::ApiRequests => self.max_api_requests,
            MeterKey::Logs => self.max_logs,
            MeterKey::Sessions => self.max_sessions,
            MeterKey::Crashes => self.max_crashes,
            MeterKey::Projects => self.max_projects,
            MeterKey::BusinessConfigKeys => self.max_business_config_keys,
            MeterKey::LocalizationLanguages => self.max_localization_languages,
            MeterKey::LocalizationKeys => self.max_localization_keys,
            MeterKey::TeamMembers => self.max_team_members,
            MeterKey::MockEndpoints => self.max_mock_endpoints,
        }
    }
}

/// Immutable plan template.
///
/// # Invariants
/// - Read-only to the engine; created and edited by operator flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier.
    pub id: PlanId,
    /// Machine name (for example `free`, `pro`).
    pub name: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Price in minor currency units.
    pub price_cents: u64,
    /// ISO currency code.
    pub currency: String,
    /// Billing interval.
    pub interval: BillingInterval,
    /// Retention in days for traces/logs/sessions; `None` uses
    /// [`DEFAULT_RETENTION_DAYS`].
    pub retention_days: Option<u32>,
    /// Per-meter limits.
    pub limits: PlanLimits,
    /// Optional enforcement-threshold overrides merged over engine defaults.
    pub enforcement: Option<EnforcementConfigOverride>,
}

impl Plan {
    /// Returns the effective retention days for full-fidelity operation.
    #[must_use]
    pub fn retention_days_or_default(&self) -> u32 {
        self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Subscription lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// In a trial period.
    Trialing,
    /// Payment failed; renewal pending.
    PastDue,
    /// Billing period lapsed without renewal.
    Expired,
    /// Cancelled by the tenant or operator.
    Cancelled,
}

impl SubscriptionStatus {
    /// Returns true when the status counts as active for enforcement.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// Per-meter quota override carried on a subscription.
///
/// # Invariants
/// - An absent map entry means "inherit the plan limit"; an explicit
///   [`QuotaOverride::Unlimited`] removes the limit entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaOverride {
    /// Remove the limit for this meter.
    Unlimited,
    /// Replace the plan limit with an explicit value.
    Limit(u64),
}

/// One tenant's subscription to a plan.
///
/// # Invariants
/// - `[current_period_start, current_period_end)` is the half-open billing
///   window used for period meters.
/// - `enabled` is the operator kill-switch; `false` forces SUSPENDED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Referenced plan.
    pub plan_id: PlanId,
    /// Lifecycle status.
    pub status: SubscriptionStatus,
    /// Operator kill-switch.
    pub enabled: bool,
    /// Inclusive billing period start.
    pub current_period_start: Timestamp,
    /// Exclusive billing period end.
    pub current_period_end: Timestamp,
    /// Explicit per-meter quota overrides; absent keys inherit the plan.
    pub quota_overrides: BTreeMap<MeterKey, QuotaOverride>,
}

impl Subscription {
    /// Returns the current billing window.
    #[must_use]
    pub const fn period_window(&self) -> PeriodWindow {
        PeriodWindow::new(self.current_period_start, self.current_period_end)
    }
}
