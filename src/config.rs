//! On-disk configuration: bus device paths, SPI speed, and the default
//! border color threaded through to the driver constructor. Deliberately
//! small — the core driver never reads this file itself, the CLI loads it
//! and passes the handful of fields the driver needs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::ColorName;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write config file {path}: {source}")]
    Write { path: String, #[source] source: std::io::Error },
}

fn default_i2c_device() -> String {
    "/dev/i2c-1".to_string()
}

fn default_spi_device() -> String {
    "/dev/spidev0.0".to_string()
}

fn default_spi_speed_hz() -> u32 {
    10_000_000
}

fn default_border() -> ColorName {
    ColorName::White
}

/// Device paths, SPI speed, default border color, and a verbosity toggle.
/// Every field has a default so a partial or missing config file still
/// loads successfully.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_i2c_device")]
    pub i2c_device: String,

    #[serde(default = "default_spi_device")]
    pub spi_device: String,

    #[serde(default = "default_spi_speed_hz")]
    pub spi_speed_hz: u32,

    #[serde(default = "default_border")]
    pub border: ColorName,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c_device: default_i2c_device(),
            spi_device: default_spi_device(),
            spi_speed_hz: default_spi_speed_hz(),
            border: default_border(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load from a JSON file. A missing or malformed file is the caller's
    /// problem to decide how to handle (see `main.rs`, which falls back to
    /// [`Config::default`] with a warning); this function itself never
    /// silently substitutes defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|source| ConfigError::Read { path: path_ref.display().to_string(), source })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save atomically: write to `<path>.tmp`, then rename over `path`, so a
    /// power loss mid-write never leaves a half-written config file behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_ref = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = path_ref.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .map_err(|source| ConfigError::Write { path: tmp_path.display().to_string(), source })?;
        std::fs::rename(&tmp_path, path_ref).map_err(|source| {
            let _ = std::fs::remove_file(&tmp_path);
            ConfigError::Write { path: path_ref.display().to_string(), source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spi_and_i2c_conventions() {
        let config = Config::default();
        assert_eq!(config.i2c_device, "/dev/i2c-1");
        assert_eq!(config.spi_device, "/dev/spidev0.0");
        assert_eq!(config.spi_speed_hz, 10_000_000);
        assert_eq!(config.border, ColorName::White);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"spi_speed_hz": 488000}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.spi_speed_hz, 488_000);
        assert_eq!(config.i2c_device, "/dev/i2c-1");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config { spi_speed_hz: 488_000, border: ColorName::Red, ..Config::default() };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!path.with_extension("json.tmp").exists(), "temp file must be renamed away");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(Config::load("/nonexistent/path/config.json"), Err(ConfigError::Read { .. })));
    }
}
