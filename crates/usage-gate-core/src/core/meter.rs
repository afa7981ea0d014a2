// crates/usage-gate-core/src/core/meter.rs
// ============================================================================
// Module: Usage Gate Meters
// Description: Closed meter-key set, window classification, and usage values.
// Purpose: Make meter handling exhaustive and compile-time checked.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Meters are the named countable resources of the platform (devices, API
//! traces, logs, sessions, ...). The meter set is a closed enum so that
//! adding a meter is a compile-time-checked change rather than a
//! string-keyed lookup. Each meter carries a counting window classification
//! (lifetime versus billing period) and, for some meters, a distinct-count
//! dimension.
//!
//! Usage percentages are deliberately **not capped at 100**: values above
//! 100 are what drive hard-threshold crossing in the evaluator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Meter Keys
// ============================================================================

/// Closed set of countable resources recognized by the engine.
///
/// # Invariants
/// - Variants are stable for serialization; wire names are camelCase to match
///   the platform API surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum MeterKey {
    /// Registered devices in the billing period.
    Devices,
    /// Captured API traces in the billing period.
    ApiTraces,
    /// Distinct API endpoint URLs seen in the billing period.
    ApiEndpoints,
    /// Raw API requests in the billing period.
    ApiRequests,
    /// Log entries ingested in the billing period.
    Logs,
    /// Sessions recorded in the billing period.
    Sessions,
    /// Crash reports in the billing period.
    Crashes,
    /// Projects created over the tenant lifetime.
    Projects,
    /// Business-config keys over the tenant lifetime.
    BusinessConfigKeys,
    /// Localization languages over the tenant lifetime.
    LocalizationLanguages,
    /// Localization keys over the tenant lifetime.
    LocalizationKeys,
    /// Distinct team member user ids across all tenant projects.
    TeamMembers,
    /// Mock endpoints over the tenant lifetime.
    MockEndpoints,
}

/// Counting window classification for a meter.
///
/// # Invariants
/// - Lifetime meters are never reset by billing cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterWindow {
    /// Counted over the tenant's entire history.
    Lifetime,
    /// Counted only within the current billing period.
    Period,
}

impl MeterKey {
    /// Every recognized meter key, in stable order.
    pub const ALL: [Self; 13] = [
        Self::Devices,
        Self::ApiTraces,
        Self::ApiEndpoints,
        Self::ApiRequests,
        Self::Logs,
        Self::Sessions,
        Self::Crashes,
        Self::Projects,
        Self::BusinessConfigKeys,
        Self::LocalizationLanguages,
        Self::LocalizationKeys,
        Self::TeamMembers,
        Self::MockEndpoints,
    ];

    /// Returns the stable wire name for the meter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Devices => "devices",
            Self::ApiTraces => "apiTraces",
            Self::ApiEndpoints => "apiEndpoints",
            Self::ApiRequests => "apiRequests",
            Self::Logs => "logs",
            Self::Sessions => "sessions",
            Self::Crashes => "crashes",
            Self::Projects => "projects",
            Self::BusinessConfigKeys => "businessConfigKeys",
            Self::LocalizationLanguages => "localizationLanguages",
            Self::LocalizationKeys => "localizationKeys",
            Self::TeamMembers => "teamMembers",
            Self::MockEndpoints => "mockEndpoints",
        }
    }

    /// Returns the counting window classification for the meter.
    #[must_use]
    pub const fn window(self) -> MeterWindow {
        match self {
            Self::Devices
            | Self::ApiTraces
            | Self::ApiEndpoints
            | Self::ApiRequests
            | Self::Logs
            | Self::Sessions
            | Self::Crashes => MeterWindow::Period,
            Self::Projects
            | Self::BusinessConfigKeys
            | Self::LocalizationLanguages
            | Self::LocalizationKeys
            | Self::TeamMembers
            | Self::MockEndpoints => MeterWindow::Lifetime,
        }
    }

    /// Returns true when the meter counts distinct dimension values rather
    /// than raw events (endpoint URLs, member user ids).
    #[must_use]
    pub const fn counts_distinct(self) -> bool {
        matches!(self, Self::ApiEndpoints | Self::TeamMembers)
    }

    /// Returns true when the meter participates in enforcement-state
    /// evaluation. Quota-gated meters outside this set are still enforced by
    /// the per-meter hard gate but never move the subscription-wide state.
    #[must_use]
    pub const fn enforcement_input(self) -> bool {
        matches!(
            self,
            Self::Devices
                | Self::ApiTraces
                | Self::Logs
                | Self::Sessions
                | Self::Crashes
                | Self::Projects
        )
    }
}

// ============================================================================
// SECTION: Usage Values
// ============================================================================

/// Usage reading for a single meter against its resolved limit.
///
/// # Invariants
/// - `percentage` is uncapped and may exceed 100.
/// - `limit == None` means unlimited; such meters never throttle and never
///   contribute to threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageMeter {
    /// Observed usage count.
    pub used: u64,
    /// Resolved limit, `None` when unlimited.
    pub limit: Option<u64>,
    /// Usage as a percentage of the limit; `0.0` when unlimited.
    pub percentage: f64,
}

impl UsageMeter {
    /// Creates a usage reading, computing the uncapped percentage.
    #[must_use]
    pub fn new(used: u64, limit: Option<u64>) -> Self {
        let percentage = match limit {
            #[allow(
                clippy::cast_precision_loss,
                reason = "Usage counts are far below f64 integer precision."
            )]
            Some(limit) if limit > 0 => (used as f64) / (limit as f64) * 100.0,
            Some(_) | None => 0.0,
        };
        Self {
            used,
            limit,
            percentage,
        }
    }
}

/// Usage readings for the full meter set of one tenant.
///
/// # Invariants
/// - Contains exactly one entry per [`MeterKey`]; lookups are total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Readings keyed by meter.
    meters: BTreeMap<MeterKey, UsageMeter>,
}

impl UsageSnapshot {
    /// Builds a snapshot from per-meter readings.
    #[must_use]
    pub const fn new(meters: BTreeMap<MeterKey, UsageMeter>) -> Self {
        Self {
            meters,
        }
    }

    /// Returns the reading for a meter, or an empty unlimited reading when
    /// the snapshot was built without it.
    #[must_use]
    pub fn meter(&self, key: MeterKey) -> UsageMeter {
        self.meters.get(&key).copied().unwrap_or_else(|| UsageMeter::new(0, None))
    }

    /// Iterates over all readings in stable meter order.
    pub fn iter(&self) -> impl Iterator<Item = (MeterKey, UsageMeter)> + '_ {
        self.meters.iter().map(|(key, meter)| (*key, *meter))
    }
}
