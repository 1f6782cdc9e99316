//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunable rules of the placement engine in one serde record.
//! - Validate values before any component consumes them.
//!
//! # Invariants
//! - `pass_threshold` is within the grade scale `0..=100`.
//! - `quarter_unit_cap` and `max_draft_subjects` are at least 1.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Category name that allows several concurrently selected subjects.
pub const DEFAULT_EXEMPTION_CATEGORY: &str = "Electives";
/// Minimum passing grade.
pub const DEFAULT_PASS_THRESHOLD: u8 = 80;
/// Soft cap of expected units per quarter for leveled students.
pub const DEFAULT_QUARTER_UNIT_CAP: usize = 18;
/// How long a confirmed overload prompt stays suppressed.
pub const DEFAULT_OVERLOAD_REMEMBER_WINDOW_MS: i64 = 10 * 60 * 1000;
/// Subject slots available while drafting a projection.
pub const DEFAULT_MAX_DRAFT_SUBJECTS: usize = 6;
/// Levels a drafted subject may extend into.
pub const DEFAULT_MAX_EXTENSION_LEVELS: u32 = 2;

/// How subjects inside one ordinary category may be combined in a draft.
///
/// Selecting a neighboring level next to one already chosen (Math 1 beside
/// Math 2) needs `Contiguous`; the default rejects any second subject of the
/// same category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// At most one subject per ordinary category.
    #[default]
    SingleSubject,
    /// Several subjects per category, as long as they form an unbroken run
    /// in the category's level ordering.
    Contiguous,
}

/// Tunable engine rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub exemption_category: String,
    pub pass_threshold: u8,
    pub quarter_unit_cap: usize,
    pub overload_remember_window_ms: i64,
    pub max_draft_subjects: usize,
    pub max_extension_levels: u32,
    pub selection_mode: SelectionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exemption_category: DEFAULT_EXEMPTION_CATEGORY.to_string(),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            quarter_unit_cap: DEFAULT_QUARTER_UNIT_CAP,
            overload_remember_window_ms: DEFAULT_OVERLOAD_REMEMBER_WINDOW_MS,
            max_draft_subjects: DEFAULT_MAX_DRAFT_SUBJECTS,
            max_extension_levels: DEFAULT_MAX_EXTENSION_LEVELS,
            selection_mode: SelectionMode::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document and validates the result.
    ///
    /// Missing keys fall back to defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exemption_category.trim().is_empty() {
            return Err(ConfigError::BlankExemptionCategory);
        }
        if self.pass_threshold > 100 {
            return Err(ConfigError::PassThresholdOutOfRange(self.pass_threshold));
        }
        if self.quarter_unit_cap == 0 {
            return Err(ConfigError::ZeroQuarterCap);
        }
        if self.overload_remember_window_ms < 0 {
            return Err(ConfigError::NegativeRememberWindow(
                self.overload_remember_window_ms,
            ));
        }
        if self.max_draft_subjects == 0 {
            return Err(ConfigError::ZeroDraftSubjects);
        }
        Ok(())
    }
}

/// Configuration parse/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    BlankExemptionCategory,
    PassThresholdOutOfRange(u8),
    ZeroQuarterCap,
    NegativeRememberWindow(i64),
    ZeroDraftSubjects,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid engine config: {message}"),
            Self::BlankExemptionCategory => {
                write!(f, "exemption category name must not be blank")
            }
            Self::PassThresholdOutOfRange(value) => {
                write!(f, "pass threshold must be within 0..=100, got {value}")
            }
            Self::ZeroQuarterCap => write!(f, "quarter unit cap must be at least 1"),
            Self::NegativeRememberWindow(value) => {
                write!(f, "overload remember window must not be negative, got {value}")
            }
            Self::ZeroDraftSubjects => write!(f, "draft must allow at least one subject"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig, SelectionMode};

    #[test]
    fn defaults_match_curriculum_rules() {
        let config = EngineConfig::default();
        assert_eq!(config.pass_threshold, 80);
        assert_eq!(config.quarter_unit_cap, 18);
        assert_eq!(config.overload_remember_window_ms, 600_000);
        assert_eq!(config.max_draft_subjects, 6);
        assert_eq!(config.max_extension_levels, 2);
        assert_eq!(config.selection_mode, SelectionMode::SingleSubject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_json_fills_missing_keys_with_defaults() {
        let config = EngineConfig::from_json(
            r#"{"exemptionCategory":"Optativas","selectionMode":"contiguous"}"#,
        )
        .expect("partial config should parse");
        assert_eq!(config.exemption_category, "Optativas");
        assert_eq!(config.selection_mode, SelectionMode::Contiguous);
        assert_eq!(config.quarter_unit_cap, 18);
    }

    #[test]
    fn from_json_rejects_invalid_values() {
        let err = EngineConfig::from_json(r#"{"passThreshold":120}"#)
            .expect_err("threshold above scale must fail");
        assert_eq!(err, ConfigError::PassThresholdOutOfRange(120));

        let err = EngineConfig::from_json(r#"{"quarterUnitCap":0}"#)
            .expect_err("zero cap must fail");
        assert_eq!(err, ConfigError::ZeroQuarterCap);

        let err = EngineConfig::from_json("not json").expect_err("garbage must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
