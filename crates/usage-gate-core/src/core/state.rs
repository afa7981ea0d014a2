// crates/usage-gate-core/src/core/state.rs
// ============================================================================
// Module: Usage Gate Enforcement State
// Description: Hysteresis states, trigger records, and persisted state records.
// Purpose: Capture the one piece of persisted hysteresis with stable semantics.
// Dependencies: crate::core::{meter, policy, time}, serde
// ============================================================================

//! ## Overview
//! Enforcement state is the hysteresis output of the evaluator. The
//! persisted [`EnforcementRecord`] is created on the first evaluation for a
//! tenant and updated (never replaced) on every subsequent one; "entered"
//! timestamps are set only if previously unset so they record the original
//! transition time across repeated re-evaluations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::meter::MeterKey;
use crate::core::policy::EffectivePolicy;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Enforcement State
// ============================================================================

/// Subscription-wide enforcement state.
///
/// # Invariants
/// - Wire forms are SCREAMING_SNAKE for compatibility with the platform API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementState {
    /// Normal operation, all meters healthy.
    Active,
    /// At least one meter past the warn threshold.
    Warn,
    /// Past the hard threshold, inside the grace window.
    Grace,
    /// Grace expired; degraded-operation policy applies.
    Degraded,
    /// Operator kill-switch or inactive subscription; overrides everything.
    Suspended,
}

impl EnforcementState {
    /// Returns the stable wire name for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Warn => "WARN",
            Self::Grace => "GRACE",
            Self::Degraded => "DEGRADED",
            Self::Suspended => "SUSPENDED",
        }
    }

    /// Returns true when the state re-evaluates on the short interval.
    #[must_use]
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Grace | Self::Degraded | Self::Suspended)
    }
}

// ============================================================================
// SECTION: Triggered Meters
// ============================================================================

/// Threshold level crossed by a meter.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerLevel {
    /// Warn threshold crossed.
    Warn,
    /// Hard threshold crossed.
    Hard,
}

/// One meter that crossed a threshold during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggeredMeter {
    /// The meter that crossed.
    pub meter: MeterKey,
    /// Observed usage count.
    pub used: u64,
    /// Resolved limit at evaluation time.
    pub limit: u64,
    /// Uncapped usage percentage.
    pub percentage: f64,
    /// Threshold level crossed.
    pub level: TriggerLevel,
}

// ============================================================================
// SECTION: Evaluation Output
// ============================================================================

/// Output of one enforcement evaluation.
///
/// # Invariants
/// - `grace_ends_at` is present exactly when `state` is [`EnforcementState::Grace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementEvaluation {
    /// Computed state.
    pub state: EnforcementState,
    /// Meters that crossed a threshold, in stable meter order.
    pub triggered_meters: Vec<TriggeredMeter>,
    /// Policy derived from the computed state.
    pub effective_policy: EffectivePolicy,
    /// End of the grace window while in grace.
    pub grace_ends_at: Option<Timestamp>,
    /// When this evaluation ran.
    pub evaluated_at: Timestamp,
    /// When the state becomes stale and must be recomputed.
    pub next_evaluation_at: Timestamp,
}

// ============================================================================
// SECTION: Persisted Record
// ============================================================================

/// Persisted enforcement state for one tenant.
///
/// # Invariants
/// - Created on first evaluation; updated, never replaced, afterwards.
/// - "Entered" timestamps are first-write-wins: [`EnforcementRecord::apply`]
///   sets them only when currently unset.
/// - Never deleted while the subscription exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementRecord {
    /// Current state.
    pub state: EnforcementState,
    /// When WARN was first entered, if ever.
    pub warn_entered_at: Option<Timestamp>,
    /// When GRACE was first entered, if ever.
    pub grace_entered_at: Option<Timestamp>,
    /// End of the grace window, while one is in force.
    pub grace_ends_at: Option<Timestamp>,
    /// When DEGRADED was first entered, if ever.
    pub degraded_entered_at: Option<Timestamp>,
    /// Policy in force for the current state.
    pub effective_policy: EffectivePolicy,
    /// Meters that crossed a threshold at the last evaluation.
    pub triggered_meters: Vec<TriggeredMeter>,
    /// When the last evaluation ran.
    pub last_evaluated_at: Timestamp,
    /// When the state becomes stale.
    pub next_evaluation_at: Timestamp,
}

impl EnforcementRecord {
    /// Creates the record for a tenant's first evaluation.
    #[must_use]
    pub fn from_evaluation(evaluation: &EnforcementEvaluation) -> Self {
        let mut record = Self {
            state: evaluation.state,
            warn_entered_at: None,
            grace_entered_at: None,
            grace_ends_at: None,
            degraded_entered_at: None,
            effective_policy: evaluation.effective_policy,
            triggered_meters: evaluation.triggered_meters.clone(),
            last_evaluated_at: evaluation.evaluated_at,
            next_evaluation_at: evaluation.next_evaluation_at,
        };
        record.stamp_entered(evaluation);
        record
    }

    /// Applies a subsequent evaluation to the record.
    ///
    /// State, policy, triggers, and evaluation stamps are last-write;
    /// "entered" timestamps and the grace deadline are set only if currently
    /// unset, preserving the original transition times under repeated and
    /// concurrent re-evaluation.
    pub fn apply(&mut self, evaluation: &EnforcementEvaluation) {
        self.state = evaluation.state;
        self.effective_policy = evaluation.effective_policy;
        self.triggered_meters = evaluation.triggered_meters.clone();
        self.last_evaluated_at = evaluation.evaluated_at;
        self.next_evaluation_at = evaluation.next_evaluation_at;
        if evaluation.state != EnforcementState::Grace {
            // The grace deadline only survives while grace is in force.
            self.grace_ends_at = None;
        }
        self.stamp_entered(evaluation);
    }

    /// Sets the set-if-absent timestamps for the evaluation's state.
    fn stamp_entered(&mut self, evaluation: &EnforcementEvaluation) {
        match evaluation.state {
            EnforcementState::Warn => {
                self.warn_entered_at.get_or_insert(evaluation.evaluated_at);
            }
            EnforcementState::Grace => {
                self.grace_entered_at.get_or_insert(evaluation.evaluated_at);
                if let Some(ends_at) = evaluation.grace_ends_at {
                    self.grace_ends_at.get_or_insert(ends_at);
                }
            }
            EnforcementState::Degraded => {
                self.degraded_entered_at.get_or_insert(evaluation.evaluated_at);
            }
            EnforcementState::Active | EnforcementState::Suspended => {}
        }
    }
}
