// crates/usage-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Usage Gate Interfaces
// Description: Backend-agnostic storage ports for the enforcement engine.
// Purpose: Define the contract surfaces the engine consumes from hosts.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The engine never touches persistence directly; subscriptions, plans,
//! usage counters, and enforcement state are reached through the four port
//! traits defined here. Implementations must be safe for concurrent callers
//! and must bound their I/O; the engine treats every port call as a single
//! short round trip.
//!
//! The enforcement-state upsert is the one primitive with non-trivial
//! semantics: it must be atomic and must apply set-if-absent "entered"
//! timestamps so that concurrent writers preserve the original transition
//! time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::EnforcementEvaluation;
use crate::core::EnforcementRecord;
use crate::core::MeterKey;
use crate::core::PeriodWindow;
use crate::core::Plan;
use crate::core::PlanId;
use crate::core::Subscription;
use crate::core::TenantId;

// ============================================================================
// SECTION: Store Error
// ============================================================================

/// Storage port errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store reported an error.
    #[error("store error: {0}")]
    Store(String),
    /// A persisted payload failed to deserialize.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Subscription and Plan Stores
// ============================================================================

/// Read access to tenant subscriptions.
pub trait SubscriptionStore {
    /// Returns the subscription for a tenant, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store fails.
    fn subscription_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<Subscription>, StoreError>;
}

/// Read access to plan templates.
pub trait PlanStore {
    /// Returns the plan with the given identifier, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store fails.
    fn plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, StoreError>;
}

// ============================================================================
// SECTION: Usage Store
// ============================================================================

/// Read access to raw usage counters.
pub trait UsageStore {
    /// Counts usage for one meter, optionally restricted to a billing window.
    ///
    /// Meters whose [`MeterKey::counts_distinct`] is true count distinct
    /// dimension values (endpoint URLs, member user ids) rather than raw
    /// events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store fails; callers treat
    /// this as "usage unavailable" and fail open.
    fn count(
        &self,
        tenant_id: &TenantId,
        meter: MeterKey,
        window: Option<&PeriodWindow>,
    ) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Enforcement State Store
// ============================================================================

/// Persistence for the per-tenant enforcement hysteresis.
pub trait EnforcementStateStore {
    /// Loads the persisted record for a tenant, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store fails.
    fn load(&self, tenant_id: &TenantId) -> Result<Option<EnforcementRecord>, StoreError>;

    /// Creates or updates the record for a tenant from an evaluation and
    /// returns the stored result.
    ///
    /// Implementations must be atomic: "entered" timestamps are set only if
    /// currently unset (first-write-wins), never overwritten by a concurrent
    /// writer. [`EnforcementRecord::apply`] captures the required merge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store fails.
    fn upsert(
        &self,
        tenant_id: &TenantId,
        evaluation: &EnforcementEvaluation,
    ) -> Result<EnforcementRecord, StoreError>;
}
