// crates/usage-gate-core/src/core/time.rs
// ============================================================================
// Module: Usage Gate Time Model
// Description: Canonical timestamp and billing-window representations.
// Purpose: Provide deterministic, host-supplied time values for evaluation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Usage Gate uses explicit time values supplied by callers to keep
//! evaluation deterministic and testable. The core engine never reads
//! wall-clock time directly; hosts pass `now` into every operation that
//! needs it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds per minute.
pub const MILLIS_PER_MINUTE: i64 = 60 * 1_000;
/// Milliseconds per hour.
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp: unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp shifted by the given milliseconds, saturating at bounds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the timestamp shifted forward by whole minutes, saturating at bounds.
    #[must_use]
    pub const fn add_minutes(self, minutes: i64) -> Self {
        self.saturating_add_millis(minutes.saturating_mul(MILLIS_PER_MINUTE))
    }

    /// Returns the timestamp shifted forward by whole hours, saturating at bounds.
    #[must_use]
    pub const fn add_hours(self, hours: i64) -> Self {
        self.saturating_add_millis(hours.saturating_mul(MILLIS_PER_HOUR))
    }
}

// ============================================================================
// SECTION: Billing Window
// ============================================================================

/// Half-open billing period window `[start, end)`.
///
/// # Invariants
/// - `start <= end`; windows never wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    /// Inclusive window start.
    pub start: Timestamp,
    /// Exclusive window end.
    pub end: Timestamp,
}

impl PeriodWindow {
    /// Creates a new billing window.
    #[must_use]
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
        }
    }

    /// Returns true when the timestamp falls inside the half-open window.
    #[must_use]
    pub fn contains(&self, at: Timestamp) -> bool {
        at >= self.start && at < self.end
    }
}
