//! Camera and exposure configuration.
//!
//! Settings are loaded from a TOML file and may be overridden from the
//! command line. Exposure and gain are optional: when absent the device
//! keeps whatever it currently has.

use crate::instrument::ExposureKind;
use crate::MAX_DEVICES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which camera to use and how to set it up on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index (0 to 15).
    pub device: i32,
    /// Exposure time in microseconds applied on connect.
    pub exposure_us: Option<i32>,
    /// Gain in decibels applied on connect.
    pub gain_db: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            exposure_us: None,
            gain_db: None,
        }
    }
}

impl CameraConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device < 0 || self.device as usize >= MAX_DEVICES {
            return Err(ConfigError::InvalidDevice(self.device));
        }
        if matches!(self.exposure_us, Some(us) if us <= 0) {
            return Err(ConfigError::InvalidExposure);
        }
        Ok(())
    }
}

/// Default exposure request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    /// Exposure type.
    pub kind: ExposureKind,
    /// Frames summed per object exposure.
    pub nframe: i32,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            kind: ExposureKind::Object,
            nframe: 1,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory images are written to.
    pub directory: PathBuf,
    /// File name prefix.
    pub prefix: String,
    /// Run continuously (true) or take a fixed number of exposures (false).
    pub continuous: bool,
    /// Number of exposures if not continuous.
    pub count: u32,
    /// Pause between exposures in milliseconds.
    pub interval_ms: u64,
    /// Also write a PNG preview next to each FITS file.
    pub preview: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("fvc"),
            prefix: "FVC".to_string(),
            continuous: false,
            count: 1,
            interval_ms: 1000,
            preview: false,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub exposure: ExposureConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        if self.exposure.nframe < 1 {
            return Err(ConfigError::InvalidFrameCount(self.exposure.nframe));
        }
        if self.output.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("device index {0} out of range (must be 0-15)")]
    InvalidDevice(i32),
    #[error("invalid exposure time")]
    InvalidExposure,
    #[error("invalid frame count {0} (must be at least 1)")]
    InvalidFrameCount(i32),
    #[error("output prefix must not be empty")]
    EmptyPrefix,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}
