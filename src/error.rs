//! Errors surfaced to callers of the camera manager.

use crate::capture::DriverError;
use thiserror::Error;

/// Failure of a camera manager operation.
///
/// Every native failure is terminal for the call that hit it; nothing is
/// retried and no partial result is returned.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Caller passed a value outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The device index has no open session.
    #[error("camera {index} not found or not opened")]
    NotOpen {
        /// Device index.
        index: i32,
    },

    /// The device does not match the fixed image geometry.
    #[error("{what} mismatched: expected {expected}, got {actual}")]
    ConfigurationMismatch {
        /// Which property was checked.
        what: &'static str,
        /// Required value.
        expected: i64,
        /// Value reported by the device.
        actual: i64,
    },

    /// A native call returned a non-success code.
    #[error("{call} failed: {source}")]
    Device {
        /// Native call and parameter, e.g. `xiGetParamInt(exposure:min)`.
        call: String,
        /// Underlying driver failure.
        #[source]
        source: DriverError,
    },

    /// No frame arrived within the acquisition timeout.
    #[error("camera {index}: no frame within {timeout_ms} ms")]
    CaptureTimeout {
        /// Device index.
        index: i32,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The output buffer could not be allocated.
    #[error("failed to allocate {bytes} byte image buffer")]
    AllocationFailure {
        /// Requested size.
        bytes: usize,
    },
}

impl CameraError {
    /// Wraps a driver failure with the name of the call that produced it.
    pub fn device(call: impl Into<String>, source: DriverError) -> Self {
        CameraError::Device {
            call: call.into(),
            source,
        }
    }
}
