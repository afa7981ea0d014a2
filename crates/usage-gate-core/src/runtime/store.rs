// crates/usage-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Usage Gate In-Memory Stores
// Description: Simple in-memory port implementations for tests and examples.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides in-memory implementations of all four storage ports
//! for tests and local demos. They are not intended for production use. The
//! usage store records individual timestamped events so window and
//! distinct-count semantics behave like a real counter backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::EnforcementEvaluation;
use crate::core::EnforcementRecord;
use crate::core::MeterKey;
use crate::core::PeriodWindow;
use crate::core::Plan;
use crate::core::PlanId;
use crate::core::Subscription;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::interfaces::EnforcementStateStore;
use crate::interfaces::PlanStore;
use crate::interfaces::StoreError;
use crate::interfaces::SubscriptionStore;
use crate::interfaces::UsageStore;

// ============================================================================
// SECTION: Subscription and Plan Stores
// ============================================================================

/// In-memory subscription store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySubscriptionStore {
    /// Subscriptions keyed by tenant.
    subscriptions: Arc<Mutex<BTreeMap<TenantId, Subscription>>>,
}

impl InMemorySubscriptionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the subscription for its tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn put(&self, subscription: Subscription) -> Result<(), StoreError> {
        let mut guard = lock(&self.subscriptions, "subscription store")?;
        guard.insert(subscription.tenant_id.clone(), subscription);
        Ok(())
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn subscription_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<Subscription>, StoreError> {
        let guard = lock(&self.subscriptions, "subscription store")?;
        Ok(guard.get(tenant_id).cloned())
    }
}

/// In-memory plan store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPlanStore {
    /// Plans keyed by identifier.
    plans: Arc<Mutex<BTreeMap<PlanId, Plan>>>,
}

impl InMemoryPlanStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn put(&self, plan: Plan) -> Result<(), StoreError> {
        let mut guard = lock(&self.plans, "plan store")?;
        guard.insert(plan.id.clone(), plan);
        Ok(())
    }
}

impl PlanStore for InMemoryPlanStore {
    fn plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, StoreError> {
        let guard = lock(&self.plans, "plan store")?;
        Ok(guard.get(plan_id).cloned())
    }
}

// ============================================================================
// SECTION: Usage Store
// ============================================================================

/// One recorded usage event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UsageEvent {
    /// Meter the event counts against.
    meter: MeterKey,
    /// When the event occurred.
    at: Timestamp,
    /// Distinct-count dimension value, when the meter deduplicates.
    distinct_key: Option<String>,
}

/// In-memory usage store recording individual events.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUsageStore {
    /// Events keyed by tenant.
    events: Arc<Mutex<BTreeMap<TenantId, Vec<UsageEvent>>>>,
}

impl InMemoryUsageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one usage event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn record(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        at: Timestamp,
        distinct_key: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut guard = lock(&self.events, "usage store")?;
        guard.entry(tenant_id.clone()).or_default().push(UsageEvent {
            meter,
            at,
            distinct_key: distinct_key.map(str::to_string),
        });
        Ok(())
    }

    /// Records `count` identical events at one timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn record_many(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        at: Timestamp,
        count: u64,
    ) -> Result<(), StoreError> {
        for _ in 0..count {
            self.record(tenant_id, meter, at, None)?;
        }
        Ok(())
    }
}

impl UsageStore for InMemoryUsageStore {
    fn count(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        window: Option<&PeriodWindow>,
    ) -> Result<u64, StoreError> {
        let guard = lock(&self.events, "usage store")?;
        let Some(events) = guard.get(tenant_id) else {
            return Ok(0);
        };
        let matching = events
            .iter()
            .filter(|event| event.meter == meter)
            .filter(|event| window.is_none_or(|window| window.contains(event.at)));

        if meter.counts_distinct() {
            let mut keyed = BTreeSet::new();
            let mut keyless = 0u64;
            for event in matching {
                match &event.distinct_key {
                    Some(key) => {
                        keyed.insert(key.clone());
                    }
                    None => keyless += 1,
                }
            }
            Ok(keyed.len() as u64 + keyless)
        } else {
            Ok(matching.count() as u64)
        }
    }
}

// ============================================================================
// SECTION: Enforcement State Store
// ============================================================================

/// In-memory enforcement state store with first-write-wins timestamps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEnforcementStateStore {
    /// Records keyed by tenant.
    records: Arc<Mutex<BTreeMap<TenantId, EnforcementRecord>>>,
}

impl InMemoryEnforcementStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnforcementStateStore for InMemoryEnforcementStateStore {
    fn load(&self, tenant_id: &TenantId) -> Result<Option<EnforcementRecord>, StoreError> {
        let guard = lock(&self.records, "enforcement state store")?;
        Ok(guard.get(tenant_id).cloned())
    }

    fn upsert(
        &self,
        tenant_id: &TenantId,
        evaluation: &EnforcementEvaluation,
    ) -> Result<EnforcementRecord, StoreError> {
        let mut guard = lock(&self.records, "enforcement state store")?;
        let record = match guard.get_mut(tenant_id) {
            Some(record) => {
                record.apply(evaluation);
                record.clone()
            }
            None => {
                let record = EnforcementRecord::from_evaluation(evaluation);
                guard.insert(tenant_id.clone(), record.clone());
                record
            }
        };
        Ok(record)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks a store mutex, mapping poisoning to a store error.
fn lock<'a, T>(
    mutex: &'a Arc<Mutex<T>>,
    label: &str,
) -> Result<std::sync::MutexGuard<'a, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Store(format!("{label} mutex poisoned")))
}
