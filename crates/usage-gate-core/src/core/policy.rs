// crates/usage-gate-core/src/core/policy.rs
// ============================================================================
// Module: Usage Gate Effective Policy
// Description: Sampling, retention, and freeze parameters in force for a tenant.
// Purpose: Provide the derived policy value types returned by the engine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The effective policy is the concrete set of sampling rates, retention
//! windows, and feature freezes currently in force for a tenant. It is
//! derived from the enforcement state by the policy generator and persisted
//! only inside the enforcement record, never independently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Sampling
// ============================================================================

/// Sampling directive for an event stream.
///
/// # Invariants
/// - `rate` means "keep one event in `rate`"; full fidelity is
///   `{ enabled: false, rate: 1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingDirective {
    /// Whether sampling applies.
    pub enabled: bool,
    /// Keep one event in `rate`.
    pub rate: u32,
}

impl SamplingDirective {
    /// Full-fidelity directive: sampling off, every event kept.
    #[must_use]
    pub const fn full_fidelity() -> Self {
        Self {
            enabled: false,
            rate: 1,
        }
    }

    /// Degraded directive keeping one event in `rate`.
    #[must_use]
    pub const fn degraded(rate: u32) -> Self {
        Self {
            enabled: true,
            rate,
        }
    }
}

/// Log-stream policy while the tenant is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPolicy {
    /// Sampling directive for log entries.
    pub sampling: SamplingDirective,
    /// Drop debug-level entries while degraded.
    pub drop_debug: bool,
    /// Keep crash-adjacent entries ahead of others while degraded.
    pub prioritize_crashes: bool,
}

impl LogPolicy {
    /// Full-fidelity log policy.
    #[must_use]
    pub const fn full_fidelity() -> Self {
        Self {
            sampling: SamplingDirective::full_fidelity(),
            drop_debug: false,
            prioritize_crashes: false,
        }
    }
}

/// Sampling policy across the event-stream modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// API trace sampling.
    pub api_traces: SamplingDirective,
    /// Session sampling.
    pub sessions: SamplingDirective,
    /// Log sampling and filtering.
    pub logs: LogPolicy,
}

// ============================================================================
// SECTION: Retention
// ============================================================================

/// Retention windows in days per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// API trace retention in days.
    pub api_traces_days: u32,
    /// Log retention in days.
    pub logs_days: u32,
    /// Session retention in days.
    pub sessions_days: u32,
}

impl RetentionPolicy {
    /// Uniform retention across all modules.
    #[must_use]
    pub const fn uniform(days: u32) -> Self {
        Self {
            api_traces_days: days,
            logs_days: days,
            sessions_days: days,
        }
    }
}

// ============================================================================
// SECTION: Freezes
// ============================================================================

/// Freeze directive for a publishing module.
///
/// # Invariants
/// - A frozen module always pairs with `serve_last_published` so reads keep
///   working while writes are blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeDirective {
    /// Whether publishing is frozen.
    pub frozen: bool,
    /// Serve the last published payload while frozen.
    pub serve_last_published: bool,
}

impl FreezeDirective {
    /// No freeze in force.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            frozen: false,
            serve_last_published: true,
        }
    }

    /// Publishing frozen, last published payload still served.
    #[must_use]
    pub const fn frozen() -> Self {
        Self {
            frozen: true,
            serve_last_published: true,
        }
    }
}

/// Freeze policy across the publishing modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezePolicy {
    /// Business-config publishing freeze.
    pub business_config: FreezeDirective,
    /// Localization publishing freeze.
    pub localization: FreezeDirective,
}

// ============================================================================
// SECTION: Effective Policy
// ============================================================================

/// The sampling/retention/freeze parameters currently in force for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePolicy {
    /// Sampling across event-stream modules.
    pub sampling: SamplingPolicy,
    /// Retention windows per module.
    pub retention: RetentionPolicy,
    /// Freezes across publishing modules.
    pub freezes: FreezePolicy,
}

impl EffectivePolicy {
    /// Full-fidelity policy with the given retention window.
    #[must_use]
    pub const fn full_fidelity(retention_days: u32) -> Self {
        Self {
            sampling: SamplingPolicy {
                api_traces: SamplingDirective::full_fidelity(),
                sessions: SamplingDirective::full_fidelity(),
                logs: LogPolicy::full_fidelity(),
            },
            retention: RetentionPolicy::uniform(retention_days),
            freezes: FreezePolicy {
                business_config: FreezeDirective::none(),
                localization: FreezeDirective::none(),
            },
        }
    }
}
