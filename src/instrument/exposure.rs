//! Exposure types and the record produced by one exposure.

use crate::capture::SumImage;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an exposure is for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExposureKind {
    /// Fiber image at the configured exposure time, `nframe` frames summed.
    #[default]
    Object,
    /// Single frame at the shortest exposure the device allows.
    Bias,
    /// Synthetic all-ones image; the device is not touched.
    Test,
}

impl ExposureKind {
    /// Lower-case name used in file names and headers.
    pub fn as_str(self) -> &'static str {
        match self {
            ExposureKind::Object => "object",
            ExposureKind::Bias => "bias",
            ExposureKind::Test => "test",
        }
    }
}

impl fmt::Display for ExposureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished exposure and the settings it was taken with.
#[derive(Debug, Clone)]
pub struct Exposure {
    /// Summed image.
    pub image: SumImage,
    /// Exposure type.
    pub kind: ExposureKind,
    /// Frames summed (0 for test images).
    pub nframe: u32,
    /// Exposure time per frame in microseconds (0 for test images).
    pub exposure_us: i32,
    /// Gain in decibels.
    pub gain_db: f32,
    /// Instrument description, `XIMEA <model> SN<serial>`.
    pub instrument: String,
    /// Local time the exposure started.
    pub timestamp: DateTime<Local>,
}

impl Exposure {
    /// Header keywords describing this exposure.
    pub fn header(&self) -> ExposureHeader {
        ExposureHeader {
            date: self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            instrument: self.instrument.clone(),
            exptime: self.exposure_us,
            nframe: self.nframe,
            gain: self.gain_db,
            imtype: self.kind,
        }
    }
}

/// Header keywords stored in the primary HDU of each image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureHeader {
    /// File creation date (local).
    #[serde(rename = "DATE")]
    pub date: String,
    /// Instrument used to acquire the image.
    #[serde(rename = "INSTRUME")]
    pub instrument: String,
    /// Exposure time in microseconds.
    #[serde(rename = "EXPTIME")]
    pub exptime: i32,
    /// Number of frames.
    #[serde(rename = "NFRAME")]
    pub nframe: u32,
    /// Gain in decibels.
    #[serde(rename = "GAIN")]
    pub gain: f32,
    /// Exposure type.
    #[serde(rename = "IMTYPE")]
    pub imtype: ExposureKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_header_keywords() {
        let exposure = Exposure {
            image: SumImage::filled(2, 2, 1).unwrap(),
            kind: ExposureKind::Bias,
            nframe: 1,
            exposure_us: 28,
            gain_db: 1.5,
            instrument: "XIMEA MQ013MG-E2 SN1d2c".to_string(),
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 21, 4, 5).unwrap(),
        };

        let text = toml::to_string(&exposure.header()).unwrap();
        assert!(text.contains("DATE = \"2024-03-09T21:04:05\""));
        assert!(text.contains("INSTRUME = \"XIMEA MQ013MG-E2 SN1d2c\""));
        assert!(text.contains("EXPTIME = 28"));
        assert!(text.contains("IMTYPE = \"bias\""));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ExposureKind::Object.to_string(), "object");
        assert_eq!(ExposureKind::default(), ExposureKind::Object);
    }
}
