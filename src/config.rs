// src/config.rs

//! Engine configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Deduplication engine settings.
///
/// Owned by the external configuration layer; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of dedup records kept per source
    #[serde(default = "defaults::max_size")]
    pub max_size: usize,

    /// Hours during which a re-sighted key is suppressed
    #[serde(default = "defaults::debounce_hours")]
    pub debounce_hours: f64,

    /// Retention for the memory-hygiene sweep, as a multiple of the
    /// debounce window. Must be >= 1 so the sweep never removes a record
    /// still inside the window.
    #[serde(default = "defaults::retention_multiplier")]
    pub retention_multiplier: f64,

    /// Emit per-item key derivation traces at debug level
    #[serde(default)]
    pub enable_debug_logging: bool,

    /// Extra tracking-parameter name prefixes stripped during link
    /// normalization, in addition to the built-in set
    #[serde(default)]
    pub extra_tracking_prefixes: Vec<String>,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(AppError::validation("max_size must be > 0"));
        }
        if !(self.debounce_hours > 0.0) {
            return Err(AppError::validation("debounce_hours must be > 0"));
        }
        if !(self.retention_multiplier >= 1.0) {
            return Err(AppError::validation("retention_multiplier must be >= 1"));
        }
        Ok(())
    }

    /// Debounce window in seconds.
    pub fn debounce_secs(&self) -> f64 {
        self.debounce_hours * 3600.0
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_size: defaults::max_size(),
            debounce_hours: defaults::debounce_hours(),
            retention_multiplier: defaults::retention_multiplier(),
            enable_debug_logging: false,
            extra_tracking_prefixes: Vec::new(),
        }
    }
}

mod defaults {
    pub fn max_size() -> usize {
        1000
    }
    pub fn debounce_hours() -> f64 {
        24.0
    }
    pub fn retention_multiplier() -> f64 {
        2.0
    }
}
