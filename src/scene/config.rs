//! Configuration for the resolution engine

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Configuration options for scene resolution
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Grid step in meters when sampling free positions inside a feasible region
    pub search_step: f64,

    /// Upper bound on positions sampled per object per attempt
    pub max_candidates: usize,

    /// Gap kept between an object and a reference it is not adjacent to
    pub spacing: f64,

    /// Backjumps allowed before the placement search gives up
    pub max_backjumps: usize,

    /// Correction rounds allowed while spatial conflicts remain
    pub max_correction_rounds: usize,

    /// Deletions allowed while size conflicts remain
    pub max_deletion_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_step: 0.05,
            max_candidates: 4096,
            spacing: 0.05,
            max_backjumps: 256,
            max_correction_rounds: 32,
            max_deletion_rounds: 32,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.search_step.is_finite() && self.search_step > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "search_step".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        if !(self.spacing.is_finite() && self.spacing >= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "spacing".to_string(),
                reason: "must be zero or positive".to_string(),
            });
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_candidates".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the sampling step
    pub fn with_search_step(mut self, step: f64) -> Self {
        self.search_step = step;
        self
    }

    /// Set the gap for non-adjacent relations
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the backjump bound of the placement search
    pub fn with_max_backjumps(mut self, max: usize) -> Self {
        self.max_backjumps = max;
        self
    }

    /// Set the correction round bound
    pub fn with_max_correction_rounds(mut self, max: usize) -> Self {
        self.max_correction_rounds = max;
        self
    }

    /// Set the deletion bound
    pub fn with_max_deletion_rounds(mut self, max: usize) -> Self {
        self.max_deletion_rounds = max;
        self
    }
}
