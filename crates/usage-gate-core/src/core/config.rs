// crates/usage-gate-core/src/core/config.rs
// ============================================================================
// Module: Usage Gate Enforcement Configuration
// Description: Typed enforcement thresholds and per-module degradation rules.
// Purpose: Replace free-form config blobs with explicit defaults and merging.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Enforcement configuration carries the warn/hard thresholds, the grace
//! window, and per-module degradation knobs. Plans may carry a partial
//! override; [`EnforcementConfig::merged`] applies it over the built-in
//! defaults field by field so that unset knobs always resolve to a defined
//! value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default warn threshold in percent of limit.
pub const DEFAULT_WARN_THRESHOLD: f64 = 80.0;
/// Default hard threshold in percent of limit.
pub const DEFAULT_HARD_THRESHOLD: f64 = 100.0;
/// Default grace window in hours once the hard threshold is crossed.
pub const DEFAULT_GRACE_PERIOD_HOURS: u32 = 48;
/// Default overage buffer in percent added to the hard threshold.
pub const DEFAULT_OVERAGE_BUFFER_PERCENT: f64 = 0.0;
/// Default degraded sampling rate (keep one event in N).
pub const DEFAULT_SAMPLING_RATE: u32 = 10;
/// Default minimum retention floor for degraded logs, in days.
pub const DEFAULT_MIN_LOG_RETENTION_DAYS: u32 = 7;

// ============================================================================
// SECTION: Module Rules
// ============================================================================

/// Closed set of platform modules with degradation knobs.
///
/// # Invariants
/// - Variants are stable for serialization and enumeration surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleName {
    /// API trace capture.
    ApiTraces,
    /// Session recording.
    Sessions,
    /// Log ingestion.
    Logs,
    /// Business-config publishing.
    BusinessConfig,
    /// Localization publishing.
    Localization,
}

/// Sampling knob for an event-stream module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingRule {
    /// Keep one event in `sampling_rate` while degraded.
    pub sampling_rate: u32,
}

impl Default for SamplingRule {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
        }
    }
}

/// Degradation knobs for log ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRules {
    /// Retention floor in days while degraded.
    pub min_retention_days: u32,
    /// Keep crash-adjacent entries ahead of others while degraded.
    pub prioritize_crashes: bool,
}

impl Default for LogRules {
    fn default() -> Self {
        Self {
            min_retention_days: DEFAULT_MIN_LOG_RETENTION_DAYS,
            prioritize_crashes: true,
        }
    }
}

/// Freeze knobs for a publishing module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeRule {
    /// Freeze new publishes while degraded.
    pub freeze_publishing: bool,
    /// Keep serving the last published payload while frozen.
    pub serve_last_published: bool,
}

impl Default for FreezeRule {
    fn default() -> Self {
        Self {
            freeze_publishing: true,
            serve_last_published: true,
        }
    }
}

/// Per-module degradation rules merged over built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleRules {
    /// API trace capture knobs.
    pub api_traces: SamplingRule,
    /// Session recording knobs.
    pub sessions: SamplingRule,
    /// Log ingestion knobs.
    pub logs: LogRules,
    /// Business-config publishing knobs.
    pub business_config: FreezeRule,
    /// Localization publishing knobs.
    pub localization: FreezeRule,
}

// ============================================================================
// SECTION: Enforcement Config
// ============================================================================

/// Resolved enforcement configuration with every knob defined.
///
/// # Invariants
/// - `warn_threshold < hard_threshold` for meaningful hysteresis; validation
///   happens at the configuration boundary, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Warn threshold in percent of limit.
    pub warn_threshold: f64,
    /// Hard threshold in percent of limit.
    pub hard_threshold: f64,
    /// Grace window in hours once the hard threshold is crossed.
    pub grace_period_hours: u32,
    /// Buffer in percent added to the hard threshold before grace begins.
    pub overage_buffer_percent: f64,
    /// Per-module degradation rules.
    pub module_rules: ModuleRules,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            hard_threshold: DEFAULT_HARD_THRESHOLD,
            grace_period_hours: DEFAULT_GRACE_PERIOD_HOURS,
            overage_buffer_percent: DEFAULT_OVERAGE_BUFFER_PERCENT,
            module_rules: ModuleRules::default(),
        }
    }
}

impl EnforcementConfig {
    /// Returns the hard threshold shifted by the overage buffer. Grace and
    /// degradation begin only past this effective value.
    #[must_use]
    pub fn effective_hard_threshold(&self) -> f64 {
        self.hard_threshold + self.overage_buffer_percent
    }

    /// Merges a partial override over these values, field by field.
    #[must_use]
    pub fn merged(&self, overlay: Option<&EnforcementConfigOverride>) -> Self {
        let Some(overlay) = overlay else {
            return *self;
        };
        Self {
            warn_threshold: overlay.warn_threshold.unwrap_or(self.warn_threshold),
            hard_threshold: overlay.hard_threshold.unwrap_or(self.hard_threshold),
            grace_period_hours: overlay.grace_period_hours.unwrap_or(self.grace_period_hours),
            overage_buffer_percent: overlay
                .overage_buffer_percent
                .unwrap_or(self.overage_buffer_percent),
            module_rules: ModuleRules {
                api_traces: overlay.api_traces.unwrap_or(self.module_rules.api_traces),
                sessions: overlay.sessions.unwrap_or(self.module_rules.sessions),
                logs: overlay.logs.unwrap_or(self.module_rules.logs),
                business_config: overlay
                    .business_config
                    .unwrap_or(self.module_rules.business_config),
                localization: overlay.localization.unwrap_or(self.module_rules.localization),
            },
        }
    }
}

/// Partial enforcement override carried on a plan.
///
/// # Invariants
/// - Unset fields inherit the engine defaults during merging.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnforcementConfigOverride {
    /// Warn threshold override.
    pub warn_threshold: Option<f64>,
    /// Hard threshold override.
    pub hard_threshold: Option<f64>,
    /// Grace window override.
    pub grace_period_hours: Option<u32>,
    /// Overage buffer override.
    pub overage_buffer_percent: Option<f64>,
    /// API trace rule override.
    pub api_traces: Option<SamplingRule>,
    /// Session rule override.
    pub sessions: Option<SamplingRule>,
    /// Log rule override.
    pub logs: Option<LogRules>,
    /// Business-config rule override.
    pub business_config: Option<FreezeRule>,
    /// Localization rule override.
    pub localization: Option<FreezeRule>,
}
