//! Native camera access and frame handling.
//!
//! This module defines the driver seam the rest of the crate is written
//! against, a deterministic mock implementation of it, the summed image
//! type returned by exposures, and the file configuration.

mod config;
mod driver;
mod frame;
mod mock;

pub use config::{CameraConfig, ConfigError, ExposureConfig, FileConfig, OutputConfig};
pub use driver::{status, CameraDriver, DriverError, ImageFormat, Param, ParamInfo, ParamKey};
pub use frame::SumImage;
pub use mock::{FramePattern, MockCall, MockDevice, MockDriver, MockHandle};
