//! XIMEA xiQ Camera Control Library
//!
//! Session management, parameter access and frame summing for the
//! fiber viewing camera, a monochrome xiQ (1280x1024, 16-bit raw) used to
//! image back-illuminated fibers.
//!
//! # Architecture
//!
//! ```text
//! capture (driver seam, mock, SumImage)
//!     ↓
//! session (CameraManager: open/close, params, expose)
//!     ↓
//! instrument (Camera, exposure kinds, FITS writer)
//!     ↓
//!           metrics (Prometheus counters)
//! ```
//!
//! # Design Principles
//!
//! - **Index addressing**: callers name devices 0 to 15, handles never leave the manager
//! - **Fail fast**: operations on a closed index fail before any native call
//! - **Sum, not average**: frames are added with 16-bit wraparound
//! - **Acquisition is scoped**: a started acquisition is stopped on every exit path
//!
//! # Example
//!
//! ```
//! use xiq_camera::{CameraManager, MockDriver};
//!
//! let mut cams = CameraManager::new(MockDriver::default());
//! assert_eq!(cams.count_devices().unwrap(), 1);
//!
//! cams.open(0).unwrap();
//! cams.set_exposure(0, 12_000).unwrap();
//!
//! let image = cams.expose(0, 4).unwrap();
//! assert_eq!(image.frames(), 4);
//! assert_eq!(image.width(), xiq_camera::IMAGE_WIDTH);
//!
//! cams.close(0).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

use std::time::Duration;

pub mod capture;
pub mod error;
pub mod instrument;
pub mod metrics;
#[cfg(feature = "xiapi")]
pub mod sdk;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{CameraDriver, DriverError, FileConfig, MockDevice, MockDriver, SumImage};
pub use error::CameraError;
pub use instrument::{Camera, Exposure, ExposureKind, ExposureWriter, InstrumentError};
pub use metrics::CaptureMetrics;
pub use session::{CameraManager, ParamRange};

/// Number of session slots; valid indices are `0..MAX_DEVICES`.
pub const MAX_DEVICES: usize = 16;

/// Expected sensor width in pixels.
pub const IMAGE_WIDTH: usize = 1280;

/// Expected sensor height in pixels.
pub const IMAGE_HEIGHT: usize = 1024;

/// Samples per frame.
pub const IMAGE_PIXELS: usize = IMAGE_WIDTH * IMAGE_HEIGHT;

/// How long a single frame read may block.
pub const ACQUISITION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Longest string parameter read from a device, in bytes.
pub const MAX_STRING_LEN: usize = 255;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
