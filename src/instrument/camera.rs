//! Fiber viewing camera bound to one device index.

use super::exposure::{Exposure, ExposureKind};
use crate::capture::{CameraDriver, SumImage};
use crate::error::CameraError;
use crate::session::{CameraManager, ParamRange};
use crate::{IMAGE_HEIGHT, IMAGE_WIDTH};
use chrono::Local;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the instrument layer.
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("exposure time too small {requested} < {min}")]
    ExposureTooSmall { requested: i32, min: i32 },
    #[error("exposure time too large {requested} > {max}")]
    ExposureTooLarge { requested: i32, max: i32 },
    #[error("gain too small {requested:.2} < {min:.2}")]
    GainTooSmall { requested: f32, min: f32 },
    #[error("gain too large {requested:.2} > {max:.2}")]
    GainTooLarge { requested: f32, max: f32 },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write FITS file: {0}")]
    Fits(#[from] fitsio::errors::Error),
    #[error("image buffer does not match its dimensions")]
    Geometry,
}

/// Identity and settings of a connected camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraStatus {
    /// Model name.
    pub model: String,
    /// Serial number, lower-case hex.
    pub serial: String,
    /// Current exposure time in microseconds.
    pub exposure_us: i32,
    /// Current gain in decibels.
    pub gain_db: f32,
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model=\"XIMEA {}\" SN=\"{}\" exptime={}us gain={:.2}db",
            self.model, self.serial, self.exposure_us, self.gain_db
        )
    }
}

/// Serial numbers are 32-bit unsigned on the device but read through the
/// signed integer parameter interface; reinterpret the bits before
/// printing so the high bit never shows up as a sign.
fn serial_hex(serial: i32) -> String {
    format!("{:x}", serial as u32)
}

/// A connected camera with its identity and parameter ranges cached.
///
/// Setters validate against the cached range before touching the device,
/// so an out-of-range request fails without a native call.
pub struct Camera<D: CameraDriver> {
    manager: CameraManager<D>,
    index: i32,
    model: String,
    serial: String,
    exposure: ParamRange<i32>,
    gain: ParamRange<f32>,
}

impl<D: CameraDriver> Camera<D> {
    /// Opens `index`, reads identity and ranges, then applies the optional
    /// exposure and gain.
    pub fn connect(
        mut manager: CameraManager<D>,
        index: i32,
        exposure_us: Option<i32>,
        gain_db: Option<f32>,
    ) -> Result<Self, InstrumentError> {
        manager.open(index)?;
        let mut camera = Self {
            exposure: manager.exposure(index)?,
            gain: manager.gain(index)?,
            model: manager.device_name(index)?,
            serial: serial_hex(manager.device_serial_number(index)?),
            manager,
            index,
        };

        if let Some(us) = exposure_us {
            camera.set_exposure(us)?;
        }
        if let Some(db) = gain_db {
            camera.set_gain(db)?;
        }

        tracing::info!(
            device = index,
            model = %camera.model,
            serial = %camera.serial,
            exposure_us = camera.exposure.current,
            gain_db = camera.gain.current,
            "Camera connected"
        );
        Ok(camera)
    }

    /// Closes and reopens the device, re-reading identity and ranges.
    pub fn reconnect(&mut self) -> Result<(), InstrumentError> {
        self.manager.close(self.index)?;
        self.manager.open(self.index)?;
        self.refresh()?;
        tracing::info!(device = self.index, "Camera reconnected");
        Ok(())
    }

    /// Re-reads identity and parameter ranges from the device.
    pub fn refresh(&mut self) -> Result<(), InstrumentError> {
        self.exposure = self.manager.exposure(self.index)?;
        self.gain = self.manager.gain(self.index)?;
        self.model = self.manager.device_name(self.index)?;
        self.serial = serial_hex(self.manager.device_serial_number(self.index)?);
        Ok(())
    }

    /// Sets the exposure time after checking it against the device range.
    pub fn set_exposure(&mut self, microseconds: i32) -> Result<(), InstrumentError> {
        if microseconds < self.exposure.min {
            return Err(InstrumentError::ExposureTooSmall {
                requested: microseconds,
                min: self.exposure.min,
            });
        }
        if microseconds > self.exposure.max {
            return Err(InstrumentError::ExposureTooLarge {
                requested: microseconds,
                max: self.exposure.max,
            });
        }
        self.manager.set_exposure(self.index, microseconds)?;
        self.exposure.current = microseconds;
        Ok(())
    }

    /// Sets the gain after checking it against the device range.
    pub fn set_gain(&mut self, decibels: f32) -> Result<(), InstrumentError> {
        if decibels < self.gain.min {
            return Err(InstrumentError::GainTooSmall {
                requested: decibels,
                min: self.gain.min,
            });
        }
        if decibels > self.gain.max {
            return Err(InstrumentError::GainTooLarge {
                requested: decibels,
                max: self.gain.max,
            });
        }
        self.manager.set_gain(self.index, decibels)?;
        self.gain.current = decibels;
        Ok(())
    }

    /// Takes an exposure of the given kind.
    ///
    /// `nframe` only applies to object exposures. A bias exposure runs at
    /// the minimum exposure time and puts the previous exposure time back
    /// afterwards, also when the frame itself failed.
    pub fn expose(&mut self, kind: ExposureKind, nframe: i32) -> Result<Exposure, InstrumentError> {
        let timestamp = Local::now();
        tracing::info!(device = self.index, %kind, nframe, "Exposing");

        let (image, nframe, exposure_us) = match kind {
            ExposureKind::Object => {
                let image = self.manager.expose(self.index, nframe)?;
                (image, nframe as u32, self.exposure.current)
            }
            ExposureKind::Bias => {
                let original = self.exposure.current;
                let min = self.exposure.min;
                self.manager.set_exposure(self.index, min)?;
                let image = self.manager.expose(self.index, 1);
                let restored = self.manager.set_exposure(self.index, original);
                let image = image?;
                restored?;
                (image, 1, min)
            }
            ExposureKind::Test => (SumImage::filled(IMAGE_WIDTH, IMAGE_HEIGHT, 1)?, 0, 0),
        };

        Ok(Exposure {
            image,
            kind,
            nframe,
            exposure_us,
            gain_db: self.gain.current,
            instrument: self.instrument(),
            timestamp,
        })
    }

    /// Current identity and settings.
    pub fn status(&self) -> CameraStatus {
        CameraStatus {
            model: self.model.clone(),
            serial: self.serial.clone(),
            exposure_us: self.exposure.current,
            gain_db: self.gain.current,
        }
    }

    /// `XIMEA <model> SN<serial>`.
    pub fn instrument(&self) -> String {
        format!("XIMEA {} SN{}", self.model, self.serial)
    }

    /// Device index.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Cached exposure range.
    pub fn exposure_range(&self) -> ParamRange<i32> {
        self.exposure
    }

    /// Cached gain range.
    pub fn gain_range(&self) -> ParamRange<f32> {
        self.gain
    }

    /// The manager this camera runs on.
    pub fn manager(&self) -> &CameraManager<D> {
        &self.manager
    }

    /// Mutable access to the manager.
    pub fn manager_mut(&mut self) -> &mut CameraManager<D> {
        &mut self.manager
    }

    /// Closes the session and hands the manager back.
    pub fn disconnect(mut self) -> Result<CameraManager<D>, InstrumentError> {
        self.manager.close(self.index)?;
        Ok(self.manager)
    }
}
