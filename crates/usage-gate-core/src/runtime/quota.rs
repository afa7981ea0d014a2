// crates/usage-gate-core/src/runtime/quota.rs
// ============================================================================
// Module: Usage Gate Quota Resolver
// Description: Merges plan limits with per-subscription quota overrides.
// Purpose: Produce the effective per-meter limits for one tenant.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Quota resolution is a total, pure merge: for every known meter, an
//! explicit subscription override wins (including an explicit override to
//! unlimited), otherwise the plan limit applies. There are no failure modes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::MeterKey;
use crate::core::Plan;
use crate::core::QuotaOverride;
use crate::core::Subscription;

// ============================================================================
// SECTION: Resolved Quotas
// ============================================================================

/// Effective per-meter limits for one tenant.
///
/// # Invariants
/// - Contains an entry for every [`MeterKey`]; lookups are total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuotas {
    /// Effective limit per meter; `None` = unlimited.
    limits: BTreeMap<MeterKey, Option<u64>>,
}

impl ResolvedQuotas {
    /// Returns the effective limit for a meter (`None` = unlimited).
    #[must_use]
    pub fn limit(&self, meter: MeterKey) -> Option<u64> {
        self.limits.get(&meter).copied().flatten()
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves the effective limits for a subscription against its plan.
///
/// Rule per meter: an explicit subscription override wins, including an
/// explicit override to unlimited; absent overrides inherit the plan value.
#[must_use]
pub fn resolve_quotas(subscription: &Subscription, plan: &Plan) -> ResolvedQuotas {
    let mut limits = BTreeMap::new();
    for meter in MeterKey::ALL {
        let limit = match subscription.quota_overrides.get(&meter) {
            Some(QuotaOverride::Unlimited) => None,
            Some(QuotaOverride::Limit(value)) => Some(*value),
            None => plan.limits.limit(meter),
        };
        limits.insert(meter, limit);
    }
    ResolvedQuotas {
        limits,
    }
}
