//! Conversion configuration.
//!
//! Handles loading, validating, and merging the optional `config.toml`.
//! Stock defaults are overridden by the user file, which in turn is overridden
//! by the positional quality/height arguments on the command line.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! quality = 85              # WebP quality (0-100)
//! max_height = 1440         # Pages taller than this are downscaled
//!
//! [processing]
//! max_workers = 4           # Max parallel conversions (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [images]
//! max_height = 2048
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration for a conversion run.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Page encoding settings (quality, height cap).
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 0-100".into(),
            ));
        }
        if self.images.max_height == 0 {
            return Err(ConfigError::Validation(
                "images.max_height must be greater than 0".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the loaded config and revalidate.
    pub fn with_overrides(
        mut self,
        quality: Option<u32>,
        max_height: Option<u32>,
        max_workers: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if let Some(q) = quality {
            self.images.quality = q;
        }
        if let Some(h) = max_height {
            self.images.max_height = h;
        }
        if let Some(n) = max_workers {
            self.processing.max_workers = Some(n);
        }
        self.validate()?;
        Ok(self)
    }
}

/// Page encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// WebP encoding quality (0 = worst, 100 = best), applied to every page.
    pub quality: u32,
    /// Pages taller than this many pixels are scaled down to it.
    pub max_height: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            max_height: 1440,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of pages converted at the same time.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_workers
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from an optional TOML file.
///
/// `None` yields the validated stock defaults. A given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `--gen-config` CLI flag.
pub fn stock_config_toml() -> &'static str {
    r##"# comic-shrink configuration
# ==========================
#
# Every key is optional; omitted keys keep the defaults shown here.
# Positional QUALITY / MAX_HEIGHT arguments override this file.

[images]
# WebP quality for every page, 0 (smallest) to 100 (best).
quality = 85

# Pages taller than this are downscaled to exactly this height,
# keeping their aspect ratio. Shorter pages keep their size.
max_height = 1440

[processing]
# Maximum pages converted in parallel. Omit to use every CPU core.
# Values above the core count are clamped down.
# max_workers = 4
"##
}
