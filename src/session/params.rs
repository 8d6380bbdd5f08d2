//! Scalar parameter accessors.
//!
//! Values are never cached: each call goes to the device, which stays the
//! single source of truth.

use super::manager::{CameraManager, NativeResult};
use super::table::DeviceIndex;
use crate::capture::{CameraDriver, Param, ParamKey};
use crate::error::CameraError;
use crate::MAX_STRING_LEN;

/// Current value of a parameter together with its device-reported bounds.
///
/// Passed through exactly as the device reports it, so `min <= current <=
/// max` only holds if the device is consistent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange<T> {
    /// Current value.
    pub current: T,
    /// Lower bound.
    pub min: T,
    /// Upper bound.
    pub max: T,
}

impl<T: PartialOrd> ParamRange<T> {
    /// Whether `value` lies within `[min, max]`.
    pub fn contains(&self, value: &T) -> bool {
        *value >= self.min && *value <= self.max
    }
}

impl<T> From<ParamRange<T>> for (T, T, T) {
    fn from(range: ParamRange<T>) -> Self {
        (range.current, range.min, range.max)
    }
}

impl<D: CameraDriver> CameraManager<D> {
    /// Sets the exposure time in microseconds.
    pub fn set_exposure(&mut self, index: i32, microseconds: i32) -> Result<(), CameraError> {
        let index = DeviceIndex::new(index)?;
        let (driver, handle) = self.session(index)?;

        let key = Param::Exposure.value();
        driver
            .set_param_int(handle, key, microseconds)
            .native_param("xiSetParamInt", key)?;

        tracing::debug!(device = index.public(), exposure_us = microseconds, "Exposure set");
        if let Some(metrics) = &self.metrics {
            metrics.set_exposure(microseconds);
        }
        Ok(())
    }

    /// Reads exposure time and its bounds, in microseconds.
    pub fn exposure(&mut self, index: i32) -> Result<ParamRange<i32>, CameraError> {
        let index = DeviceIndex::new(index)?;
        let (driver, handle) = self.session(index)?;

        let mut read = |key: ParamKey| {
            driver
                .get_param_int(handle, key)
                .native_param("xiGetParamInt", key)
        };
        Ok(ParamRange {
            current: read(Param::Exposure.value())?,
            min: read(Param::Exposure.min())?,
            max: read(Param::Exposure.max())?,
        })
    }

    /// Sets the gain in decibels.
    pub fn set_gain(&mut self, index: i32, decibels: f32) -> Result<(), CameraError> {
        let index = DeviceIndex::new(index)?;
        let (driver, handle) = self.session(index)?;

        let key = Param::Gain.value();
        driver
            .set_param_float(handle, key, decibels)
            .native_param("xiSetParamFloat", key)?;

        tracing::debug!(device = index.public(), gain_db = decibels, "Gain set");
        if let Some(metrics) = &self.metrics {
            metrics.set_gain(decibels);
        }
        Ok(())
    }

    /// Reads gain and its bounds, in decibels.
    pub fn gain(&mut self, index: i32) -> Result<ParamRange<f32>, CameraError> {
        let index = DeviceIndex::new(index)?;
        let (driver, handle) = self.session(index)?;

        let mut read = |key: ParamKey| {
            driver
                .get_param_float(handle, key)
                .native_param("xiGetParamFloat", key)
        };
        Ok(ParamRange {
            current: read(Param::Gain.value())?,
            min: read(Param::Gain.min())?,
            max: read(Param::Gain.max())?,
        })
    }

    /// Model name, at most 255 bytes.
    pub fn device_name(&mut self, index: i32) -> Result<String, CameraError> {
        let index = DeviceIndex::new(index)?;
        let (driver, handle) = self.session(index)?;

        let key = Param::DeviceName.value();
        driver
            .get_param_string(handle, key, MAX_STRING_LEN)
            .native_param("xiGetParamString", key)
    }

    /// Serial number.
    pub fn device_serial_number(&mut self, index: i32) -> Result<i32, CameraError> {
        let index = DeviceIndex::new(index)?;
        let (driver, handle) = self.session(index)?;

        let key = Param::DeviceSerialNumber.value();
        driver
            .get_param_int(handle, key)
            .native_param("xiGetParamInt", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{status, DriverError, MockCall, MockDevice, MockDriver};

    fn opened(device: MockDevice) -> CameraManager<MockDriver> {
        let mut cams = CameraManager::new(MockDriver::new(vec![device]));
        cams.open(0).unwrap();
        cams.driver_mut().clear_calls();
        cams
    }

    #[test]
    fn test_exposure_roundtrip() {
        let mut cams = opened(MockDevice::new().with_exposure(1000, 28, 500_000));
        cams.set_exposure(0, 20_000).unwrap();

        let range = cams.exposure(0).unwrap();
        assert_eq!(<(i32, i32, i32)>::from(range), (20_000, 28, 500_000));
        assert!(range.contains(&range.current));
    }

    #[test]
    fn test_exposure_rejected_by_device() {
        let mut cams = opened(MockDevice::new().with_exposure(1000, 28, 500_000));
        let err = cams.set_exposure(0, 1_000_000).unwrap_err();

        assert!(matches!(
            err,
            CameraError::Device {
                source: DriverError::Status {
                    code: status::WRONG_PARAM_VALUE
                },
                ..
            }
        ));
        assert_eq!(cams.exposure(0).unwrap().current, 1000);
    }

    #[test]
    fn test_inconsistent_triple_passes_through() {
        let mut cams = opened(
            MockDevice::new()
                .with_exposure(5, 10, 1)
                .with_gain(9.0, 2.0, -3.0),
        );

        let exposure = cams.exposure(0).unwrap();
        assert_eq!((exposure.current, exposure.min, exposure.max), (5, 10, 1));

        let gain = cams.gain(0).unwrap();
        assert_eq!((gain.current, gain.min, gain.max), (9.0, 2.0, -3.0));
    }

    #[test]
    fn test_exposure_is_all_or_nothing() {
        let mut cams = opened(MockDevice::new());
        cams.driver_mut().fail(
            MockCall::GetParam(0, Param::Exposure.max()),
            0,
            DriverError::Status { code: status::NOT_SUPPORTED },
        );

        let err = cams.exposure(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "xiGetParamInt(exposure:max) failed: native status 12"
        );
    }

    #[test]
    fn test_gain_roundtrip() {
        let mut cams = opened(MockDevice::new().with_gain(0.0, -2.0, 12.0));
        cams.set_gain(0, 3.5).unwrap();

        let gain = cams.gain(0).unwrap();
        assert_eq!(gain.current, 3.5);
        assert_eq!(gain.min, -2.0);
        assert_eq!(gain.max, 12.0);
    }

    #[test]
    fn test_gain_failure_names_parameter() {
        let mut cams = opened(MockDevice::new());
        cams.driver_mut().fail(
            MockCall::GetParam(0, Param::Gain.min()),
            0,
            DriverError::Status { code: 1 },
        );

        let err = cams.gain(0).unwrap_err();
        assert!(err.to_string().starts_with("xiGetParamFloat(gain:min)"));
    }

    #[test]
    fn test_identity_fields() {
        let mut cams = opened(MockDevice::new().with_name("MQ013RG-E2").with_serial(0x1d2c));

        assert_eq!(cams.device_name(0).unwrap(), "MQ013RG-E2");
        assert_eq!(cams.device_serial_number(0).unwrap(), 0x1d2c);
    }

    #[test]
    fn test_long_name_is_bounded() {
        let mut cams = opened(MockDevice::new().with_name("x".repeat(400)));
        assert_eq!(cams.device_name(0).unwrap().len(), MAX_STRING_LEN);
    }

    #[test]
    fn test_accessors_on_closed_device_never_reach_driver() {
        let mut cams = CameraManager::new(MockDriver::with_devices(2));

        assert!(matches!(cams.set_exposure(1, 100), Err(CameraError::NotOpen { index: 1 })));
        assert!(matches!(cams.exposure(1), Err(CameraError::NotOpen { .. })));
        assert!(matches!(cams.set_gain(1, 1.0), Err(CameraError::NotOpen { .. })));
        assert!(matches!(cams.gain(1), Err(CameraError::NotOpen { .. })));
        assert!(matches!(cams.device_name(1), Err(CameraError::NotOpen { .. })));
        assert!(matches!(
            cams.device_serial_number(1),
            Err(CameraError::NotOpen { .. })
        ));
        assert!(cams.driver().calls().is_empty());
    }

    #[test]
    fn test_accessors_reject_bad_index() {
        let mut cams = CameraManager::new(MockDriver::default());

        for index in [-1, 16] {
            let bad = |r: Result<(), CameraError>| matches!(r, Err(CameraError::InvalidArgument(_)));
            assert!(bad(cams.set_exposure(index, 100)));
            assert!(bad(cams.exposure(index).map(|_| ())));
            assert!(bad(cams.set_gain(index, 1.0)));
            assert!(bad(cams.gain(index).map(|_| ())));
            assert!(bad(cams.device_name(index).map(|_| ())));
            assert!(bad(cams.device_serial_number(index).map(|_| ())));
        }
        assert!(cams.driver().calls().is_empty());
    }
}
