// crates/usage-gate-config/src/config.rs
// ============================================================================
// Module: Usage Gate Configuration
// Description: Configuration loading and validation for Usage Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: usage-gate-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed: a partially valid
//! file never produces a partially applied install. The enforcement
//! defaults here apply to plans that carry no override of their own; the
//! evaluation intervals drive lazy state refresh.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use usage_gate_core::DEFAULT_ACTIVE_INTERVAL_MINUTES;
use usage_gate_core::DEFAULT_ELEVATED_INTERVAL_MINUTES;
use usage_gate_core::DEFAULT_GRACE_PERIOD_HOURS;
use usage_gate_core::DEFAULT_HARD_THRESHOLD;
use usage_gate_core::DEFAULT_OVERAGE_BUFFER_PERCENT;
use usage_gate_core::DEFAULT_WARN_THRESHOLD;
use usage_gate_core::EnforcementConfig;
use usage_gate_core::EvaluatorSettings;
use usage_gate_core::ModuleRules;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "usage-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "USAGE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum accepted threshold in percent (uncapped percentages make values
/// above 100 meaningful, but installs beyond this are configuration errors).
const MAX_THRESHOLD_PERCENT: f64 = 1_000.0;
/// Maximum accepted overage buffer in percent.
const MAX_OVERAGE_BUFFER_PERCENT: f64 = 100.0;
/// Maximum grace window in hours (30 days).
const MAX_GRACE_PERIOD_HOURS: u32 = 720;
/// Maximum evaluation interval in minutes (one day).
const MAX_EVALUATION_INTERVAL_MINUTES: u32 = 1_440;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {reason}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
    /// The configuration file exceeds the size limit.
    #[error("config file {path} exceeds {MAX_CONFIG_FILE_SIZE} bytes")]
    TooLarge {
        /// Offending path.
        path: PathBuf,
    },
    /// The configuration file failed to parse.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A configured value is out of bounds.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Installation-wide enforcement defaults.
///
/// Plans carrying their own enforcement override still merge over these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnforcementDefaults {
    /// Warn threshold in percent of limit.
    pub warn_threshold: f64,
    /// Hard threshold in percent of limit.
    pub hard_threshold: f64,
    /// Grace window in hours.
    pub grace_period_hours: u32,
    /// Overage buffer in percent added to the hard threshold.
    pub overage_buffer_percent: f64,
}

impl Default for EnforcementDefaults {
    fn default() -> Self {
        Self {
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            hard_threshold: DEFAULT_HARD_THRESHOLD,
            grace_period_hours: DEFAULT_GRACE_PERIOD_HOURS,
            overage_buffer_percent: DEFAULT_OVERAGE_BUFFER_PERCENT,
        }
    }
}

impl EnforcementDefaults {
    /// Converts the section into the engine's resolved config with built-in
    /// module rules.
    #[must_use]
    pub fn to_enforcement_config(&self) -> EnforcementConfig {
        EnforcementConfig {
            warn_threshold: self.warn_threshold,
            hard_threshold: self.hard_threshold,
            grace_period_hours: self.grace_period_hours,
            overage_buffer_percent: self.overage_buffer_percent,
            module_rules: ModuleRules::default(),
        }
    }

    /// Validates section bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.warn_threshold.is_finite() && self.hard_threshold.is_finite()) {
            return Err(ConfigError::Invalid("thresholds must be finite".to_string()));
        }
        if self.warn_threshold <= 0.0 || self.hard_threshold > MAX_THRESHOLD_PERCENT {
            return Err(ConfigError::Invalid(format!(
                "thresholds must be in (0, {MAX_THRESHOLD_PERCENT}]"
            )));
        }
        if self.warn_threshold >= self.hard_threshold {
            return Err(ConfigError::Invalid(format!(
                "warn_threshold {} must be below hard_threshold {}",
                self.warn_threshold, self.hard_threshold
            )));
        }
        if !self.overage_buffer_percent.is_finite()
            || self.overage_buffer_percent < 0.0
            || self.overage_buffer_percent > MAX_OVERAGE_BUFFER_PERCENT
        {
            return Err(ConfigError::Invalid(format!(
                "overage_buffer_percent must be in [0, {MAX_OVERAGE_BUFFER_PERCENT}]"
            )));
        }
        if self.grace_period_hours == 0 || self.grace_period_hours > MAX_GRACE_PERIOD_HOURS {
            return Err(ConfigError::Invalid(format!(
                "grace_period_hours must be in [1, {MAX_GRACE_PERIOD_HOURS}]"
            )));
        }
        Ok(())
    }
}

/// Lazy re-evaluation intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationIntervals {
    /// Interval in minutes while ACTIVE or WARN.
    pub active_minutes: u32,
    /// Interval in minutes while GRACE, DEGRADED, or SUSPENDED.
    pub elevated_minutes: u32,
}

impl Default for EvaluationIntervals {
    fn default() -> Self {
        Self {
            active_minutes: DEFAULT_ACTIVE_INTERVAL_MINUTES,
            elevated_minutes: DEFAULT_ELEVATED_INTERVAL_MINUTES,
        }
    }
}

impl EvaluationIntervals {
    /// Converts the section into evaluator settings.
    #[must_use]
    pub const fn to_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            active_interval_minutes: self.active_minutes,
            elevated_interval_minutes: self.elevated_minutes,
        }
    }

    /// Validates section bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.active_minutes == 0 || self.active_minutes > MAX_EVALUATION_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "active_minutes must be in [1, {MAX_EVALUATION_INTERVAL_MINUTES}]"
            )));
        }
        if self.elevated_minutes == 0 || self.elevated_minutes > MAX_EVALUATION_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "elevated_minutes must be in [1, {MAX_EVALUATION_INTERVAL_MINUTES}]"
            )));
        }
        if self.elevated_minutes > self.active_minutes {
            return Err(ConfigError::Invalid(
                "elevated_minutes must not exceed active_minutes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Durable store settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the SQLite database file; `None` keeps stores in memory.
    pub sqlite_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Validates the configured path.
    fn validate(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.sqlite_path else {
            return Ok(());
        };
        validate_store_path(path)
    }
}

// ============================================================================
// SECTION: Gate Config
// ============================================================================

/// Top-level Usage Gate installation configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Enforcement threshold defaults.
    pub enforcement: EnforcementDefaults,
    /// Lazy re-evaluation intervals.
    pub evaluation: EvaluationIntervals,
    /// Durable store settings.
    pub store: StoreConfig,
}

impl GateConfig {
    /// Loads configuration from an explicit path, the environment override,
    /// or the default filename, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, oversized,
    /// unparsable, or out of bounds.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => env::var_os(CONFIG_ENV_VAR)
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from),
        };
        let metadata = fs::metadata(&path).map_err(|error| ConfigError::Io {
            path: path.clone(),
            reason: error.to_string(),
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE as u64 {
            return Err(ConfigError::TooLarge {
                path,
            });
        }
        let raw = fs::read_to_string(&path).map_err(|error| ConfigError::Io {
            path: path.clone(),
            reason: error.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Parse("config exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(raw).map_err(|error| ConfigError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all sections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any value is out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.enforcement.validate()?;
        self.evaluation.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

/// Rejects traversal components and oversized paths for the store database.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let display = path.display().to_string();
    if display.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "store path exceeds {MAX_TOTAL_PATH_LENGTH} bytes"
        )));
    }
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(ConfigError::Invalid(
                    "store path must not contain parent-directory components".to_string(),
                ));
            }
            Component::Normal(part) => {
                if part.len() > MAX_PATH_COMPONENT_LENGTH {
                    return Err(ConfigError::Invalid(format!(
                        "store path component exceeds {MAX_PATH_COMPONENT_LENGTH} bytes"
                    )));
                }
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    Ok(())
}
