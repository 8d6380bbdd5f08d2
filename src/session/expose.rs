//! Frame acquisition and summing.

use super::manager::{CameraManager, NativeResult};
use super::table::DeviceIndex;
use crate::capture::{CameraDriver, DriverError, SumImage};
use crate::error::CameraError;
use crate::{ACQUISITION_TIMEOUT, IMAGE_HEIGHT, IMAGE_PIXELS, IMAGE_WIDTH};

/// Acquisition window on one device.
///
/// Stop is issued exactly once: explicitly through [`Acquisition::stop`]
/// on success, or on drop when a frame fetch bailed out early.
struct Acquisition<'a, D: CameraDriver> {
    driver: &'a mut D,
    handle: &'a D::Handle,
    index: DeviceIndex,
    active: bool,
}

impl<'a, D: CameraDriver> Acquisition<'a, D> {
    fn start(
        driver: &'a mut D,
        handle: &'a D::Handle,
        index: DeviceIndex,
    ) -> Result<Self, CameraError> {
        driver.start_acquisition(handle).native("xiStartAcquisition")?;
        tracing::debug!(device = index.public(), "Acquisition started");
        Ok(Self {
            driver,
            handle,
            index,
            active: true,
        })
    }

    fn next_frame(&mut self) -> Result<&[u16], CameraError> {
        let index = self.index;
        self.driver
            .get_frame(self.handle, ACQUISITION_TIMEOUT)
            .map_err(|e| match e {
                DriverError::Timeout => CameraError::CaptureTimeout {
                    index: index.public(),
                    timeout_ms: ACQUISITION_TIMEOUT.as_millis() as u64,
                },
                source => CameraError::device("xiGetImage", source),
            })
    }

    fn stop(mut self) -> Result<(), CameraError> {
        self.active = false;
        self.driver
            .stop_acquisition(self.handle)
            .native("xiStopAcquisition")?;
        tracing::debug!(device = self.index.public(), "Acquisition stopped");
        Ok(())
    }
}

impl<D: CameraDriver> Drop for Acquisition<'_, D> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.driver.stop_acquisition(self.handle) {
            tracing::warn!(
                device = self.index.public(),
                error = %e,
                "xiStopAcquisition failed after aborted capture"
            );
        }
    }
}

impl<D: CameraDriver> CameraManager<D> {
    /// Takes `repeat_count` frames and returns their pixel-wise sum.
    ///
    /// The result is a sum, not an average: samples wrap modulo 65536
    /// once the total exceeds the 16-bit range. Blocks for up to
    /// `repeat_count` times the 5 s acquisition timeout. Acquisition is
    /// stopped on every exit path.
    pub fn expose(&mut self, index: i32, repeat_count: i32) -> Result<SumImage, CameraError> {
        let index = DeviceIndex::new(index)?;
        if repeat_count < 1 {
            return Err(CameraError::InvalidArgument(format!(
                "repeat count must be at least 1, got {repeat_count}"
            )));
        }

        let result = self.acquire(index, repeat_count as u32);

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(image) => metrics.record_exposure(image.frames()),
                Err(_) => metrics.record_failure(),
            }
        }
        result
    }

    fn acquire(&mut self, index: DeviceIndex, frames: u32) -> Result<SumImage, CameraError> {
        let (driver, handle) = self.session(index)?;
        let mut image = SumImage::zeroed(IMAGE_WIDTH, IMAGE_HEIGHT)?;

        let mut acquisition = Acquisition::start(driver, handle, index)?;
        for _ in 0..frames {
            let frame = acquisition.next_frame()?;
            if frame.len() < IMAGE_PIXELS {
                return Err(CameraError::ConfigurationMismatch {
                    what: "frame size",
                    expected: IMAGE_PIXELS as i64,
                    actual: frame.len() as i64,
                });
            }
            image.accumulate(frame);
        }
        acquisition.stop()?;

        tracing::info!(device = index.public(), frames, "Exposure complete");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{status, MockCall, MockDevice, MockDriver};
    use proptest::prelude::*;

    fn opened(driver: MockDriver) -> CameraManager<MockDriver> {
        let mut cams = CameraManager::new(driver);
        cams.open(0).unwrap();
        cams.driver_mut().clear_calls();
        cams
    }

    fn frame_value(seq: u64, px: usize) -> u16 {
        (px % 4096) as u16 + (seq as u16) * 1000
    }

    #[test]
    fn test_single_frame_equals_native_frame() {
        let mut cams = opened(MockDriver::default().with_pattern(frame_value));
        let image = cams.expose(0, 1).unwrap();

        assert_eq!(image.width(), IMAGE_WIDTH);
        assert_eq!(image.height(), IMAGE_HEIGHT);
        assert_eq!(image.frames(), 1);
        for (px, &v) in image.pixels().iter().enumerate() {
            assert_eq!(v, frame_value(0, px));
        }
    }

    #[test]
    fn test_multi_frame_is_sum_not_average() {
        let mut cams = opened(MockDriver::default().with_pattern(|seq, _| 10 + seq as u16));
        let image = cams.expose(0, 3).unwrap();

        // 10 + 11 + 12
        assert!(image.pixels().iter().all(|&v| v == 33));
        assert_eq!(image.frames(), 3);
    }

    #[test]
    fn test_sum_wraps_at_65536() {
        let mut cams = opened(MockDriver::default().with_pattern(|_, px| {
            if px == 0 {
                40_000
            } else {
                1
            }
        }));
        let image = cams.expose(0, 2).unwrap();

        assert_eq!(image.get(0, 0), Some(14_464));
        assert_eq!(image.get(1, 0), Some(2));
    }

    #[test]
    fn test_acquisition_is_bracketed() {
        let mut cams = opened(MockDriver::default());
        cams.expose(0, 2).unwrap();

        assert_eq!(
            cams.driver().calls(),
            &[
                MockCall::StartAcquisition(0),
                MockCall::GetFrame(0),
                MockCall::GetFrame(0),
                MockCall::StopAcquisition(0),
            ]
        );
        assert!(!cams.driver().is_acquiring(0));
    }

    #[test]
    fn test_timeout_still_stops_acquisition() {
        let mut cams = opened(MockDriver::default());
        cams.driver_mut()
            .fail(MockCall::GetFrame(0), 1, DriverError::Timeout);

        let err = cams.expose(0, 5).unwrap_err();
        assert!(matches!(
            err,
            CameraError::CaptureTimeout {
                index: 0,
                timeout_ms: 5000
            }
        ));
        assert_eq!(cams.driver().calls().last(), Some(&MockCall::StopAcquisition(0)));
        assert!(!cams.driver().is_acquiring(0));

        // the device is usable again
        assert!(cams.expose(0, 1).is_ok());
    }

    #[test]
    fn test_frame_failure_is_device_error() {
        let mut cams = opened(MockDriver::default());
        cams.driver_mut().fail(
            MockCall::GetFrame(0),
            0,
            DriverError::Status { code: status::INVALID_HANDLE },
        );

        let err = cams.expose(0, 1).unwrap_err();
        assert!(err.to_string().starts_with("xiGetImage failed"));
        assert!(!cams.driver().is_acquiring(0));
    }

    #[test]
    fn test_start_failure_skips_stop() {
        let mut cams = opened(MockDriver::default());
        cams.driver_mut().fail(
            MockCall::StartAcquisition(0),
            0,
            DriverError::Status { code: 57 },
        );

        let err = cams.expose(0, 1).unwrap_err();
        assert!(err.to_string().starts_with("xiStartAcquisition failed"));
        assert_eq!(cams.driver().calls(), &[MockCall::StartAcquisition(0)]);
    }

    #[test]
    fn test_stop_failure_is_reported() {
        let mut cams = opened(MockDriver::default());
        cams.driver_mut().fail(
            MockCall::StopAcquisition(0),
            0,
            DriverError::Status { code: 1 },
        );

        let err = cams.expose(0, 1).unwrap_err();
        assert!(err.to_string().starts_with("xiStopAcquisition failed"));
    }

    #[test]
    fn test_short_frame_rejected() {
        let device = MockDevice::new().with_frame_len(640 * 512);
        let mut cams = opened(MockDriver::new(vec![device]));

        let err = cams.expose(0, 1).unwrap_err();
        assert!(matches!(
            err,
            CameraError::ConfigurationMismatch {
                what: "frame size",
                actual: 327_680,
                ..
            }
        ));
        assert!(!cams.driver().is_acquiring(0));
    }

    #[test]
    fn test_invalid_repeat_count_touches_nothing() {
        let mut cams = opened(MockDriver::default());
        for repeat in [0, -1, i32::MIN] {
            assert!(matches!(
                cams.expose(0, repeat),
                Err(CameraError::InvalidArgument(_))
            ));
        }
        assert!(cams.driver().calls().is_empty());
    }

    #[test]
    fn test_expose_closed_device() {
        let mut cams = CameraManager::new(MockDriver::default());

        assert!(matches!(cams.expose(0, 1), Err(CameraError::NotOpen { index: 0 })));
        assert!(matches!(cams.expose(16, 1), Err(CameraError::InvalidArgument(_))));
        assert!(cams.driver().calls().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_sum_matches_wrapping_sum(repeat in 1i32..6) {
            let pattern = |seq: u64, px: usize| ((px as u64 * 7919 + seq * 30011) % 65536) as u16;
            let mut cams = opened(MockDriver::default().with_pattern(pattern));
            let image = cams.expose(0, repeat).unwrap();

            for px in [0usize, 1, 1279, 640 * 1024, IMAGE_PIXELS - 1] {
                let expected = (0..repeat as u64)
                    .fold(0u16, |acc, seq| acc.wrapping_add(pattern(seq, px)));
                prop_assert_eq!(image.pixels()[px], expected);
            }
        }
    }
}
