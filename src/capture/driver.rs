//! Camera driver abstraction.
//!
//! The vendor SDK is reached only through the [`CameraDriver`] trait, so
//! the session and capture logic can run against the real m3api binding
//! or against a deterministic [`MockDriver`](super::MockDriver) in tests.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Native status codes used by the drivers in this crate.
///
/// Values follow the m3api `XI_RET` table.
pub mod status {
    /// Call succeeded.
    pub const OK: i32 = 0;
    /// Handle is not valid (closed or never opened).
    pub const INVALID_HANDLE: i32 = 1;
    /// No frame arrived before the timeout elapsed.
    pub const TIMEOUT: i32 = 10;
    /// Argument rejected by the driver.
    pub const INVALID_ARG: i32 = 11;
    /// Parameter or operation not supported by this model.
    pub const NOT_SUPPORTED: i32 = 12;
    /// Value outside the range accepted by the device.
    pub const WRONG_PARAM_VALUE: i32 = 100;
}

/// Failure reported by a native driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    /// No frame was delivered within the requested timeout.
    #[error("timed out waiting for the device")]
    Timeout,
    /// Any other non-success return code.
    #[error("native status {code}")]
    Status {
        /// Raw return code of the native call.
        code: i32,
    },
}

impl DriverError {
    /// Maps a raw native return code onto a driver result.
    pub fn check(code: i32) -> Result<(), DriverError> {
        match code {
            status::OK => Ok(()),
            status::TIMEOUT => Err(DriverError::Timeout),
            code => Err(DriverError::Status { code }),
        }
    }
}

/// Device parameters touched by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Sensor output width in pixels.
    Width,
    /// Sensor output height in pixels.
    Height,
    /// Output sample format, see [`ImageFormat`].
    ImageDataFormat,
    /// Exposure time in microseconds.
    Exposure,
    /// Analog gain in decibels.
    Gain,
    /// Model name string.
    DeviceName,
    /// Serial number.
    DeviceSerialNumber,
}

impl Param {
    /// Native parameter name.
    pub fn name(self) -> &'static str {
        match self {
            Param::Width => "width",
            Param::Height => "height",
            Param::ImageDataFormat => "imgdataformat",
            Param::Exposure => "exposure",
            Param::Gain => "gain",
            Param::DeviceName => "device_name",
            Param::DeviceSerialNumber => "device_sn",
        }
    }

    /// Key addressing the current value.
    pub fn value(self) -> ParamKey {
        ParamKey {
            param: self,
            info: ParamInfo::Value,
        }
    }

    /// Key addressing the device-reported minimum.
    pub fn min(self) -> ParamKey {
        ParamKey {
            param: self,
            info: ParamInfo::Min,
        }
    }

    /// Key addressing the device-reported maximum.
    pub fn max(self) -> ParamKey {
        ParamKey {
            param: self,
            info: ParamInfo::Max,
        }
    }
}

/// Which facet of a parameter is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamInfo {
    /// Current value.
    Value,
    /// Lower bound.
    Min,
    /// Upper bound.
    Max,
}

impl ParamInfo {
    fn suffix(self) -> &'static str {
        match self {
            ParamInfo::Value => "",
            ParamInfo::Min => ":min",
            ParamInfo::Max => ":max",
        }
    }
}

/// Fully qualified parameter address, rendered as the native name
/// (`exposure`, `exposure:min`, `gain:max`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamKey {
    /// Parameter.
    pub param: Param,
    /// Facet.
    pub info: ParamInfo,
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.param.name(), self.info.suffix())
    }
}

impl From<Param> for ParamKey {
    fn from(param: Param) -> Self {
        param.value()
    }
}

/// Output sample formats (`XI_IMG_FORMAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ImageFormat {
    /// 8 bits per pixel, processed.
    Mono8 = 0,
    /// 16 bits per pixel, processed.
    Mono16 = 1,
    /// 8 bits per pixel, unprocessed sensor data.
    Raw8 = 5,
    /// 16 bits per pixel, unprocessed sensor data.
    Raw16 = 6,
}

impl ImageFormat {
    /// Native integer value.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Native camera layer.
///
/// Handles are opaque and owned by the caller; [`close_device`] consumes
/// one. Every call blocks the calling thread for the duration of the
/// native call.
///
/// [`close_device`]: CameraDriver::close_device
pub trait CameraDriver {
    /// Opaque open-device reference.
    type Handle;

    /// Number of attached devices.
    fn device_count(&mut self) -> Result<u32, DriverError>;

    /// Opens the device at `index`.
    fn open_device(&mut self, index: u32) -> Result<Self::Handle, DriverError>;

    /// Releases a handle.
    fn close_device(&mut self, handle: Self::Handle) -> Result<(), DriverError>;

    /// Reads an integer parameter.
    fn get_param_int(&mut self, handle: &Self::Handle, key: ParamKey) -> Result<i32, DriverError>;

    /// Reads a floating point parameter.
    fn get_param_float(&mut self, handle: &Self::Handle, key: ParamKey)
        -> Result<f32, DriverError>;

    /// Reads a string parameter, truncated to at most `max_len` bytes.
    fn get_param_string(
        &mut self,
        handle: &Self::Handle,
        key: ParamKey,
        max_len: usize,
    ) -> Result<String, DriverError>;

    /// Writes an integer parameter.
    fn set_param_int(
        &mut self,
        handle: &Self::Handle,
        key: ParamKey,
        value: i32,
    ) -> Result<(), DriverError>;

    /// Writes a floating point parameter.
    fn set_param_float(
        &mut self,
        handle: &Self::Handle,
        key: ParamKey,
        value: f32,
    ) -> Result<(), DriverError>;

    /// Puts the device into acquisition mode.
    fn start_acquisition(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;

    /// Blocks until one frame is available or `timeout` elapses.
    ///
    /// The returned samples are only valid until the next driver call.
    fn get_frame(&mut self, handle: &Self::Handle, timeout: Duration)
        -> Result<&[u16], DriverError>;

    /// Leaves acquisition mode.
    fn stop_acquisition(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;
}
