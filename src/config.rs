//! Catalog configuration module.
//!
//! Handles loading, validating, and merging `catalog.toml`. Stock defaults
//! are serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! max_edge = 2560           # Longest allowed side of a stored photo (px)
//! quality = 85              # JPEG quality (1-100)
//!
//! [storage]
//! data_file = "catalog.json"  # Catalog snapshot
//! media_root = "media"        # Directory for normalised photos
//!
//! [logging]
//! level = "info"            # Default filter when RUST_LOG is unset
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DEFAULT_MAX_EDGE, NormaliseParams, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "catalog.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Catalog configuration loaded from `catalog.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Upload normalisation settings.
    pub images: ImagesConfig,
    /// Where the catalog snapshot and photos live.
    pub storage: StorageConfig,
    /// Log filter defaults.
    pub logging: LoggingConfig,
}

impl CatalogConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_edge == 0 || self.images.max_edge > u16::MAX as u32 {
            return Err(ConfigError::Validation(format!(
                "images.max_edge must be 1-{}",
                u16::MAX
            )));
        }
        if self.storage.data_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.data_file must not be empty".into(),
            ));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ConfigError::Validation(format!(
                "logging.level '{}' is not a valid filter",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Resolve relative storage paths against the directory holding the config file.
    pub fn anchored_at(mut self, base: &Path) -> Self {
        if self.storage.data_file.is_relative() {
            self.storage.data_file = base.join(&self.storage.data_file);
        }
        if self.storage.media_root.is_relative() {
            self.storage.media_root = base.join(&self.storage.media_root);
        }
        self
    }
}

/// Upload normalisation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longest allowed side, in pixels, after orientation is applied.
    pub max_edge: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            quality: Quality::default().value() as u32,
        }
    }
}

impl ImagesConfig {
    pub fn normalise_params(&self) -> NormaliseParams {
        NormaliseParams {
            max_edge: self.max_edge,
            quality: Quality::new(self.quality),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// JSON snapshot of all catalog entities.
    pub data_file: PathBuf,
    /// Root directory for normalised photos.
    pub media_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("catalog.json"),
            media_root: PathBuf::from("media"),
        }
    }
}

/// Logging defaults. `RUST_LOG` always wins when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CatalogConfig::default()).expect("default config must serialize")
}

/// Lay a user's `catalog.toml` over the stock defaults.
///
/// Sections merge key by key, so a file that only sets `[images] quality`
/// keeps the stock `max_edge` and every `[storage]` path. Any non-table
/// value in `overlay` replaces the base value outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut section), toml::Value::Table(user)) => {
            for (key, value) in user {
                let merged = match section.remove(&key) {
                    Some(stock) => merge_toml(stock, value),
                    None => value,
                };
                section.insert(key, merged);
            }
            toml::Value::Table(section)
        }
        (_, replacement) => replacement,
    }
}

/// Parse config text, merge it over the stock defaults and validate.
pub fn parse_config(content: &str) -> Result<CatalogConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let config: CatalogConfig = merge_toml(stock_defaults_value(), overlay).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file.
///
/// A missing file yields the stock defaults. Relative storage paths are
/// resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<CatalogConfig, ConfigError> {
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    if !path.exists() {
        let config = CatalogConfig::default();
        config.validate()?;
        return Ok(config.anchored_at(base));
    }
    let content = fs::read_to_string(path)?;
    Ok(parse_config(&content)?.anchored_at(base))
}

/// Returns a fully-commented stock `catalog.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Car Catalog Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Uploaded photos
# ---------------------------------------------------------------------------
[images]
# Longest allowed side, in pixels. Larger uploads are scaled down with their
# aspect ratio preserved; smaller ones are never enlarged.
max_edge = 2560

# JPEG quality (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# JSON snapshot of makes, models, features, cars, images and publication logs.
# Relative paths are resolved against the directory of this file.
data_file = "catalog.json"

# Directory for normalised photos (cars/YYYY/MM/DD/<name>-<hash>.jpg).
media_root = "media"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# Default log filter, used when RUST_LOG is not set.
level = "info"
"##
}
