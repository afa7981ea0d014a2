// crates/usage-gate-core/src/runtime/usage.rs
// ============================================================================
// Module: Usage Gate Usage Aggregator
// Description: Per-meter usage readings for one tenant and billing window.
// Purpose: Turn raw store counters into uncapped usage percentages.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The aggregator issues one count per meter against the usage store:
//! lifetime meters are counted without a window, period meters within the
//! subscription's billing window. Percentages come from
//! [`UsageMeter::new`] and are never capped. A store failure makes the whole
//! snapshot unavailable; callers treat that as fail-open, not an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::MeterKey;
use crate::core::MeterWindow;
use crate::core::PeriodWindow;
use crate::core::TenantId;
use crate::core::UsageMeter;
use crate::core::UsageSnapshot;
use crate::interfaces::StoreError;
use crate::interfaces::UsageStore;
use crate::runtime::quota::ResolvedQuotas;

// ============================================================================
// SECTION: Usage Aggregator
// ============================================================================

/// Aggregates raw usage counters into per-meter readings.
#[derive(Debug, Clone)]
pub struct UsageAggregator<U> {
    /// Usage counter port.
    usage: U,
}

impl<U> UsageAggregator<U>
where
    U: UsageStore,
{
    /// Creates a new aggregator over a usage store.
    #[must_use]
    pub const fn new(usage: U) -> Self {
        Self {
            usage,
        }
    }

    /// Aggregates readings for every known meter.
    ///
    /// Period meters count only inside `period`; lifetime meters are
    /// unbounded. Unlimited meters report percentage `0`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any counter read fails; callers treat the
    /// snapshot as unavailable and fail open.
    pub fn aggregate(
        &self,
        tenant_id: &TenantId,
        quotas: &ResolvedQuotas,
        period: &PeriodWindow,
    ) -> Result<UsageSnapshot, StoreError> {
        let mut meters = BTreeMap::new();
        for meter in MeterKey::ALL {
            let window = match meter.window() {
                MeterWindow::Period => Some(period),
                MeterWindow::Lifetime => None,
            };
            let used = self.usage.count(tenant_id, meter, window)?;
            meters.insert(meter, UsageMeter::new(used, quotas.limit(meter)));
        }
        Ok(UsageSnapshot::new(meters))
    }
}
