//! Flow legalizer configuration
//!
//! Parameters can be built in code, taken from a preset or loaded from TOML:
//!
//! ```toml
//! utilization_target = 0.9
//! move_limit = 2
//! ```
//!
//! Missing keys fall back to the defaults.

use crate::error::{LegalizerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of a flow legalization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowLegalizerConfig {
    /// Fraction of a bin's width that cells may occupy
    pub utilization_target: f64,
    /// Initial bin width in multiples of the median cell width
    pub bin_width_tolerance: f64,
    /// Whole-cell moves allowed per cell within one displacement bound
    pub move_limit: u32,
    /// Initial displacement bound, in multiples of the larger bin dimension
    pub displacement_factor: f64,
    /// Growth of the displacement bound per inner pass, same unit
    pub displacement_increment: f64,
    /// Tolerance for coordinate and area comparisons
    pub epsilon: f64,
    /// Merge passes eliminating nothing that are tolerated before giving up
    pub merge_stagnation_limit: u32,
    /// Path-search rounds allowed per displacement bound
    pub max_search_rounds: usize,
}

impl Default for FlowLegalizerConfig {
    fn default() -> Self {
        Self {
            utilization_target: 1.0,
            bin_width_tolerance: 3.0,
            move_limit: 1,
            displacement_factor: 0.5,
            displacement_increment: 0.5,
            epsilon: 1.0e-3,
            merge_stagnation_limit: 1,
            max_search_rounds: 1000,
        }
    }
}

impl FlowLegalizerConfig {
    /// Coarse displacement steps and a small search budget
    pub fn fast() -> Self {
        Self {
            displacement_factor: 1.0,
            displacement_increment: 1.0,
            max_search_rounds: 100,
            ..Default::default()
        }
    }

    /// Fine displacement steps and more moves per cell
    pub fn thorough() -> Self {
        Self {
            move_limit: 2,
            displacement_factor: 0.25,
            displacement_increment: 0.25,
            merge_stagnation_limit: 2,
            max_search_rounds: 10_000,
            ..Default::default()
        }
    }

    pub fn with_utilization_target(mut self, ut: f64) -> Self {
        self.utilization_target = ut;
        self
    }

    pub fn with_bin_width_tolerance(mut self, tol: f64) -> Self {
        self.bin_width_tolerance = tol;
        self
    }

    pub fn with_move_limit(mut self, limit: u32) -> Self {
        self.move_limit = limit;
        self
    }

    pub fn with_displacement_steps(mut self, factor: f64, increment: f64) -> Self {
        self.displacement_factor = factor;
        self.displacement_increment = increment;
        self
    }

    pub fn with_max_search_rounds(mut self, rounds: usize) -> Self {
        self.max_search_rounds = rounds;
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| LegalizerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LegalizerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| LegalizerError::Config(e.to_string()))
    }

    /// Reject parameter values that would stall or break the flow loops
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(LegalizerError::Config(msg.to_string()));

        if !(self.utilization_target > 0.0 && self.utilization_target <= 1.0) {
            return invalid("utilization_target must be in (0, 1]");
        }
        if !(self.bin_width_tolerance > 0.0) {
            return invalid("bin_width_tolerance must be positive");
        }
        if self.move_limit == 0 {
            return invalid("move_limit must be at least 1");
        }
        if !(self.displacement_factor > 0.0) || !(self.displacement_increment > 0.0) {
            return invalid("displacement steps must be positive");
        }
        if !(self.epsilon > 0.0) {
            return invalid("epsilon must be positive");
        }
        if self.max_search_rounds == 0 {
            return invalid("max_search_rounds must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FlowLegalizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.move_limit, 1);
        assert_eq!(config.displacement_factor, 0.5);
        assert!(FlowLegalizerConfig::fast().validate().is_ok());
        assert!(FlowLegalizerConfig::thorough().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FlowLegalizerConfig::from_toml_str(
            r#"
            utilization_target = 0.8
            move_limit = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.utilization_target, 0.8);
        assert_eq!(config.move_limit, 3);
        assert_eq!(config.bin_width_tolerance, 3.0);
    }

    #[test]
    fn test_toml_roundtrip_preserves_values() {
        let config = FlowLegalizerConfig::thorough().with_utilization_target(0.95);
        let text = config.to_toml_string().unwrap();
        assert_eq!(FlowLegalizerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_step = FlowLegalizerConfig::default().with_displacement_steps(0.5, 0.0);
        assert!(matches!(zero_step.validate(), Err(LegalizerError::Config(_))));

        let over = FlowLegalizerConfig::default().with_utilization_target(1.5);
        assert!(over.validate().is_err());

        assert!(FlowLegalizerConfig::from_toml_str("move_limit = 0").is_err());
        assert!(FlowLegalizerConfig::from_toml_str("move_limit = \"many\"").is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = FlowLegalizerConfig::from_file("/nonexistent/dpflow.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dpflow.toml"));
    }
}
