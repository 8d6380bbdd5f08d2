//! Fiber viewing camera instrument.
//!
//! Wraps a [`CameraManager`](crate::session::CameraManager) session in a
//! [`Camera`] that knows the device identity and parameter ranges, takes
//! object, bias and test exposures, and hands them to an
//! [`ExposureWriter`] for storage.

mod camera;
mod exposure;
mod writer;

pub use camera::{Camera, CameraStatus, InstrumentError};
pub use exposure::{Exposure, ExposureHeader, ExposureKind};
pub use writer::{ExposureWriter, WrittenExposure};
