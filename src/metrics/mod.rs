//! Prometheus metrics for camera activity.
//!
//! # Metrics Exposed
//!
//! - `xiq_camera_exposures_total` - Completed exposures
//! - `xiq_camera_frames_total` - Frames summed into completed exposures
//! - `xiq_camera_capture_failures_total` - Exposures that returned an error
//! - `xiq_camera_open_sessions` - Devices with an open session
//! - `xiq_camera_exposure_microseconds` - Last exposure time written
//! - `xiq_camera_gain_decibels` - Last gain written
//!
//! # Example
//!
//! ```
//! use xiq_camera::{metrics::CaptureMetrics, CameraManager, MockDriver};
//!
//! let metrics = CaptureMetrics::new().expect("Failed to create registry");
//! let mut cams = CameraManager::new(MockDriver::default()).with_metrics(metrics.clone());
//!
//! cams.open(0).unwrap();
//! cams.expose(0, 1).unwrap();
//!
//! assert!(metrics.encode().unwrap().contains("xiq_camera_exposures_total 1"));
//! ```

mod collector;

pub use collector::{CaptureMetrics, MetricsError};
