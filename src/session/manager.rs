//! Camera manager: owns the driver and the session table.

use super::table::{DeviceIndex, SessionTable};
use crate::capture::{CameraDriver, DriverError, ImageFormat, Param, ParamKey};
use crate::error::CameraError;
use crate::metrics::CaptureMetrics;
use crate::{IMAGE_HEIGHT, IMAGE_WIDTH};

/// Attaches the failing native call to a driver result.
pub(crate) trait NativeResult<T> {
    /// Names the call, e.g. `xiStartAcquisition`.
    fn native(self, call: &str) -> Result<T, CameraError>;

    /// Names the call and the parameter it addressed.
    fn native_param(self, call: &str, key: ParamKey) -> Result<T, CameraError>;
}

impl<T> NativeResult<T> for Result<T, DriverError> {
    fn native(self, call: &str) -> Result<T, CameraError> {
        self.map_err(|source| CameraError::device(call, source))
    }

    fn native_param(self, call: &str, key: ParamKey) -> Result<T, CameraError> {
        self.map_err(|source| CameraError::device(format!("{call}({key})"), source))
    }
}

/// Owns one driver and the handles it has issued.
///
/// All operations take `&mut self`: calls on the same manager are
/// serialised by construction. Dropping the manager closes every session
/// still open.
pub struct CameraManager<D: CameraDriver> {
    pub(super) driver: D,
    pub(super) sessions: SessionTable<D::Handle>,
    pub(super) metrics: Option<CaptureMetrics>,
}

impl<D: CameraDriver> CameraManager<D> {
    /// Creates a manager with every slot closed.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            sessions: SessionTable::new(),
            metrics: None,
        }
    }

    /// Reports exposures and sessions to `metrics`.
    pub fn with_metrics(mut self, metrics: CaptureMetrics) -> Self {
        metrics.set_open_sessions(self.sessions.open_count());
        self.metrics = Some(metrics);
        self
    }

    /// The underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the underlying driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Number of attached devices.
    pub fn count_devices(&mut self) -> Result<u32, CameraError> {
        self.driver.device_count().native("xiGetNumberDevices")
    }

    /// Whether `index` has an open session.
    pub fn is_open(&self, index: i32) -> Result<bool, CameraError> {
        Ok(self.sessions.is_open(DeviceIndex::new(index)?))
    }

    /// Opens the device at `index` and prepares it for raw 16-bit capture.
    ///
    /// Opening an already open index reuses its handle. The sensor
    /// geometry is then checked against 1280x1024; on mismatch the handle
    /// stays stored so the caller can still inspect or close it.
    pub fn open(&mut self, index: i32) -> Result<(), CameraError> {
        let index = DeviceIndex::new(index)?;

        if !self.sessions.is_open(index) {
            let handle = self
                .driver
                .open_device(index.native())
                .native("xiOpenDevice")?;
            self.sessions.insert(index, handle);
            self.report_sessions();
            tracing::info!(device = index.public(), "Camera opened");
        }

        let (driver, handle) = self.session(index)?;

        check_dimension(driver, handle, Param::Width, "image width", IMAGE_WIDTH)?;
        check_dimension(driver, handle, Param::Height, "image height", IMAGE_HEIGHT)?;

        let key = Param::ImageDataFormat.value();
        driver
            .set_param_int(handle, key, ImageFormat::Raw16.code())
            .native_param("xiSetParamInt", key)?;

        tracing::debug!(device = index.public(), "Output format set to RAW16");
        Ok(())
    }

    /// Releases the session at `index`.
    ///
    /// Closing an empty slot does nothing. The slot is cleared even when
    /// the driver reports a failure while releasing the handle.
    pub fn close(&mut self, index: i32) -> Result<(), CameraError> {
        let index = DeviceIndex::new(index)?;

        if let Some(handle) = self.sessions.take(index) {
            if let Err(e) = self.driver.close_device(handle) {
                tracing::warn!(device = index.public(), error = %e, "xiCloseDevice failed");
            }
            self.report_sessions();
            tracing::info!(device = index.public(), "Camera closed");
        }
        Ok(())
    }

    /// Fails with [`CameraError::NotOpen`] unless `index` has a session.
    pub fn require_open(&self, index: i32) -> Result<(), CameraError> {
        let index = DeviceIndex::new(index)?;
        if !self.sessions.is_open(index) {
            return Err(CameraError::NotOpen {
                index: index.public(),
            });
        }
        Ok(())
    }

    /// Splits the borrow into the driver and the open handle for `index`.
    pub(super) fn session(
        &mut self,
        index: DeviceIndex,
    ) -> Result<(&mut D, &D::Handle), CameraError> {
        let handle = self.sessions.get(index).ok_or(CameraError::NotOpen {
            index: index.public(),
        })?;
        Ok((&mut self.driver, handle))
    }

    fn report_sessions(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_open_sessions(self.sessions.open_count());
        }
    }
}

fn check_dimension<D: CameraDriver>(
    driver: &mut D,
    handle: &D::Handle,
    param: Param,
    what: &'static str,
    expected: usize,
) -> Result<(), CameraError> {
    let key = param.value();
    let actual = driver
        .get_param_int(handle, key)
        .native_param("xiGetParamInt", key)?;

    if actual as i64 != expected as i64 {
        return Err(CameraError::ConfigurationMismatch {
            what,
            expected: expected as i64,
            actual: actual as i64,
        });
    }
    Ok(())
}

impl<D: CameraDriver> Drop for CameraManager<D> {
    fn drop(&mut self) {
        for (index, handle) in self.sessions.drain() {
            match self.driver.close_device(handle) {
                Ok(()) => tracing::debug!(device = index.public(), "Closed camera on shutdown"),
                Err(e) => {
                    tracing::warn!(device = index.public(), error = %e, "xiCloseDevice failed on shutdown")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{status, MockCall, MockDevice, MockDriver};
    use proptest::prelude::*;

    fn manager(devices: usize) -> CameraManager<MockDriver> {
        CameraManager::new(MockDriver::with_devices(devices))
    }

    #[test]
    fn test_count_devices() {
        let mut cams = manager(3);
        assert_eq!(cams.count_devices().unwrap(), 3);
    }

    #[test]
    fn test_count_devices_failure() {
        let mut cams = manager(1);
        cams.driver_mut()
            .fail(MockCall::DeviceCount, 0, DriverError::Status { code: 57 });

        let err = cams.count_devices().unwrap_err();
        assert!(err.to_string().contains("xiGetNumberDevices"));
    }

    #[test]
    fn test_open_sets_raw16() {
        let mut cams = manager(1);
        cams.open(0).unwrap();

        assert!(cams.is_open(0).unwrap());
        assert_eq!(cams.driver().image_format(0), Some(ImageFormat::Raw16.code()));
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut cams = manager(1);
        cams.open(0).unwrap();
        cams.open(0).unwrap();

        let opens = cams
            .driver()
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Open(_)))
            .count();
        assert_eq!(opens, 1);
    }

    #[test]
    fn test_open_then_close_clears_slot() {
        let mut cams = manager(2);
        cams.open(1).unwrap();
        cams.close(1).unwrap();

        assert!(!cams.is_open(1).unwrap());
        assert!(!cams.driver().is_device_open(1));
    }

    #[test]
    fn test_close_unopened_is_noop() {
        let mut cams = manager(1);
        cams.close(0).unwrap();
        cams.close(5).unwrap();

        assert!(cams.driver().calls().is_empty());
    }

    #[test]
    fn test_close_clears_slot_even_if_driver_fails() {
        let mut cams = manager(1);
        cams.open(0).unwrap();
        cams.driver_mut()
            .fail(MockCall::Close(0), 0, DriverError::Status { code: status::INVALID_HANDLE });

        cams.close(0).unwrap();
        assert!(!cams.is_open(0).unwrap());
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut cams = manager(1);
        let err = cams.open(4).unwrap_err();

        assert!(matches!(err, CameraError::Device { ref call, .. } if call == "xiOpenDevice"));
        assert!(!cams.is_open(4).unwrap());
    }

    #[test]
    fn test_dimension_mismatch_keeps_handle() {
        let driver = MockDriver::new(vec![MockDevice::new().with_dimensions(640, 1024)]);
        let mut cams = CameraManager::new(driver);

        let err = cams.open(0).unwrap_err();
        assert!(matches!(
            err,
            CameraError::ConfigurationMismatch {
                what: "image width",
                expected: 1280,
                actual: 640
            }
        ));
        assert!(cams.is_open(0).unwrap());

        cams.close(0).unwrap();
        assert!(!cams.driver().is_device_open(0));
    }

    #[test]
    fn test_height_mismatch() {
        let driver = MockDriver::new(vec![MockDevice::new().with_dimensions(1280, 960)]);
        let mut cams = CameraManager::new(driver);

        assert!(matches!(
            cams.open(0),
            Err(CameraError::ConfigurationMismatch {
                what: "image height",
                ..
            })
        ));
    }

    #[test]
    fn test_format_failure_is_device_error() {
        let mut cams = manager(1);
        cams.driver_mut().fail(
            MockCall::SetParam(0, Param::ImageDataFormat.value()),
            0,
            DriverError::Status { code: status::NOT_SUPPORTED },
        );

        let err = cams.open(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "xiSetParamInt(imgdataformat) failed: native status 12"
        );
    }

    #[test]
    fn test_out_of_range_index_rejected_everywhere() {
        let mut cams = manager(1);
        for index in [-1, 16, 100] {
            assert!(matches!(cams.open(index), Err(CameraError::InvalidArgument(_))));
            assert!(matches!(cams.close(index), Err(CameraError::InvalidArgument(_))));
            assert!(matches!(cams.is_open(index), Err(CameraError::InvalidArgument(_))));
            assert!(matches!(
                cams.require_open(index),
                Err(CameraError::InvalidArgument(_))
            ));
        }
        assert!(cams.driver().calls().is_empty());
    }

    proptest! {
        #[test]
        fn prop_open_close_restores_empty_slot(index in 0i32..16) {
            let mut cams = manager(16);
            cams.open(index).unwrap();
            prop_assert!(cams.is_open(index).unwrap());

            cams.close(index).unwrap();
            prop_assert!(!cams.is_open(index).unwrap());
            let not_open = matches!(cams.require_open(index), Err(CameraError::NotOpen { .. }));
            prop_assert!(not_open);

            // second close stays a no-op
            cams.close(index).unwrap();
        }
    }
}
