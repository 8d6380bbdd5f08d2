//! Deterministic in-memory camera driver.
//!
//! Used by the test suite and by the CLI when no hardware binding is
//! compiled in. Frames are generated from a pattern function so sums can
//! be checked exactly, every call is logged, and any call can be made to
//! fail on demand.

use super::driver::{status, CameraDriver, DriverError, ImageFormat, Param, ParamInfo, ParamKey};
use crate::{IMAGE_HEIGHT, IMAGE_WIDTH};
use std::time::Duration;

/// Generates the sample at `pixel` of the `sequence`-th frame of an
/// acquisition.
pub type FramePattern = fn(sequence: u64, pixel: usize) -> u16;

fn default_pattern(sequence: u64, pixel: usize) -> u16 {
    (pixel as u64).wrapping_add(sequence) as u16
}

/// A simulated camera.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDevice {
    width: i32,
    height: i32,
    exposure: (i32, i32, i32),
    gain: (f32, f32, f32),
    name: String,
    serial: i32,
    frame_len: Option<usize>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            width: IMAGE_WIDTH as i32,
            height: IMAGE_HEIGHT as i32,
            exposure: (10_000, 28, 1_000_000),
            gain: (0.0, -1.5, 6.0),
            name: "MQ013MG-E2".to_string(),
            serial: 0x2F5_4A11,
            frame_len: None,
        }
    }
}

impl MockDevice {
    /// Creates a 1280x1024 device with plausible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the reported sensor size.
    pub fn with_dimensions(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Overrides the exposure triple (current, min, max), in microseconds.
    ///
    /// The values are stored as given, consistent or not.
    pub fn with_exposure(mut self, current: i32, min: i32, max: i32) -> Self {
        self.exposure = (current, min, max);
        self
    }

    /// Overrides the gain triple (current, min, max), in decibels.
    pub fn with_gain(mut self, current: f32, min: f32, max: f32) -> Self {
        self.gain = (current, min, max);
        self
    }

    /// Overrides the model name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the serial number.
    pub fn with_serial(mut self, serial: i32) -> Self {
        self.serial = serial;
        self
    }

    /// Delivers frames of `len` samples regardless of the reported size.
    pub fn with_frame_len(mut self, len: usize) -> Self {
        self.frame_len = Some(len);
        self
    }

    fn pixel_count(&self) -> usize {
        self.frame_len
            .unwrap_or(self.width.max(0) as usize * self.height.max(0) as usize)
    }
}

/// A native call as observed by [`MockDriver`], keyed by device index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockCall {
    /// `device_count`.
    DeviceCount,
    /// `open_device`.
    Open(u32),
    /// `close_device`.
    Close(u32),
    /// Any parameter read.
    GetParam(u32, ParamKey),
    /// Any parameter write.
    SetParam(u32, ParamKey),
    /// `start_acquisition`.
    StartAcquisition(u32),
    /// `get_frame`.
    GetFrame(u32),
    /// `stop_acquisition`.
    StopAcquisition(u32),
}

/// Handle issued by [`MockDriver`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockHandle {
    device: u32,
}

impl MockHandle {
    /// Index of the device this handle refers to.
    pub fn device(&self) -> u32 {
        self.device
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    open: bool,
    acquiring: bool,
    sequence: u64,
    format: i32,
}

#[derive(Debug)]
struct Fault {
    call: MockCall,
    remaining: usize,
    error: DriverError,
}

/// In-memory [`CameraDriver`].
pub struct MockDriver {
    devices: Vec<MockDevice>,
    states: Vec<DeviceState>,
    pattern: FramePattern,
    buffer: Vec<u16>,
    calls: Vec<MockCall>,
    faults: Vec<Fault>,
}

impl MockDriver {
    /// Creates a driver with the given attached devices.
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let states = devices.iter().map(|_| DeviceState::default()).collect();
        Self {
            devices,
            states,
            pattern: default_pattern,
            buffer: Vec::new(),
            calls: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Creates a driver with `count` default devices.
    pub fn with_devices(count: usize) -> Self {
        Self::new(vec![MockDevice::default(); count])
    }

    /// Replaces the frame generator.
    pub fn with_pattern(mut self, pattern: FramePattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Makes the `after`+1-th occurrence of `call` fail with `error`.
    ///
    /// Faults fire once and are then discarded.
    pub fn fail(&mut self, call: MockCall, after: usize, error: DriverError) {
        self.faults.push(Fault {
            call,
            remaining: after,
            error,
        });
    }

    /// Every call issued so far, oldest first.
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Forgets the call log.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Simulated device at `index`.
    pub fn device(&self, index: u32) -> Option<&MockDevice> {
        self.devices.get(index as usize)
    }

    /// Whether the device currently has an open handle.
    pub fn is_device_open(&self, index: u32) -> bool {
        self.states.get(index as usize).is_some_and(|s| s.open)
    }

    /// Whether the device is in acquisition mode.
    pub fn is_acquiring(&self, index: u32) -> bool {
        self.states.get(index as usize).is_some_and(|s| s.acquiring)
    }

    /// Output format last written to the device.
    pub fn image_format(&self, index: u32) -> Option<i32> {
        self.states.get(index as usize).map(|s| s.format)
    }

    fn record(&mut self, call: MockCall) -> Result<(), DriverError> {
        self.calls.push(call);
        let Some(pos) = self.faults.iter().position(|f| f.call == call) else {
            return Ok(());
        };
        if self.faults[pos].remaining == 0 {
            let fault = self.faults.remove(pos);
            return Err(fault.error);
        }
        self.faults[pos].remaining -= 1;
        Ok(())
    }

    fn open_state(&self, handle: &MockHandle) -> Result<usize, DriverError> {
        let index = handle.device as usize;
        match self.states.get(index) {
            Some(state) if state.open => Ok(index),
            _ => Err(DriverError::Status {
                code: status::INVALID_HANDLE,
            }),
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::with_devices(1)
    }
}

fn pick<T: Copy>(triple: (T, T, T), info: ParamInfo) -> T {
    match info {
        ParamInfo::Value => triple.0,
        ParamInfo::Min => triple.1,
        ParamInfo::Max => triple.2,
    }
}

fn not_supported() -> DriverError {
    DriverError::Status {
        code: status::NOT_SUPPORTED,
    }
}

fn wrong_value() -> DriverError {
    DriverError::Status {
        code: status::WRONG_PARAM_VALUE,
    }
}

impl CameraDriver for MockDriver {
    type Handle = MockHandle;

    fn device_count(&mut self) -> Result<u32, DriverError> {
        self.record(MockCall::DeviceCount)?;
        Ok(self.devices.len() as u32)
    }

    fn open_device(&mut self, index: u32) -> Result<MockHandle, DriverError> {
        self.record(MockCall::Open(index))?;
        let state = self
            .states
            .get_mut(index as usize)
            .filter(|s| !s.open)
            .ok_or(DriverError::Status {
                code: status::INVALID_ARG,
            })?;
        *state = DeviceState {
            open: true,
            format: ImageFormat::Mono8.code(),
            ..DeviceState::default()
        };
        tracing::debug!(device = index, "MockDriver opened device");
        Ok(MockHandle { device: index })
    }

    fn close_device(&mut self, handle: MockHandle) -> Result<(), DriverError> {
        self.record(MockCall::Close(handle.device))?;
        let index = self.open_state(&handle)?;
        self.states[index].open = false;
        self.states[index].acquiring = false;
        tracing::debug!(device = handle.device, "MockDriver closed device");
        Ok(())
    }

    fn get_param_int(&mut self, handle: &MockHandle, key: ParamKey) -> Result<i32, DriverError> {
        self.record(MockCall::GetParam(handle.device, key))?;
        let index = self.open_state(handle)?;
        let device = &self.devices[index];
        match (key.param, key.info) {
            (Param::Width, ParamInfo::Value) => Ok(device.width),
            (Param::Height, ParamInfo::Value) => Ok(device.height),
            (Param::ImageDataFormat, ParamInfo::Value) => Ok(self.states[index].format),
            (Param::DeviceSerialNumber, ParamInfo::Value) => Ok(device.serial),
            (Param::Exposure, info) => Ok(pick(device.exposure, info)),
            _ => Err(not_supported()),
        }
    }

    fn get_param_float(&mut self, handle: &MockHandle, key: ParamKey) -> Result<f32, DriverError> {
        self.record(MockCall::GetParam(handle.device, key))?;
        let index = self.open_state(handle)?;
        match key.param {
            Param::Gain => Ok(pick(self.devices[index].gain, key.info)),
            _ => Err(not_supported()),
        }
    }

    fn get_param_string(
        &mut self,
        handle: &MockHandle,
        key: ParamKey,
        max_len: usize,
    ) -> Result<String, DriverError> {
        self.record(MockCall::GetParam(handle.device, key))?;
        let index = self.open_state(handle)?;
        if key != Param::DeviceName.value() {
            return Err(not_supported());
        }
        let name = &self.devices[index].name;
        let mut end = name.len().min(max_len);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Ok(name[..end].to_string())
    }

    fn set_param_int(
        &mut self,
        handle: &MockHandle,
        key: ParamKey,
        value: i32,
    ) -> Result<(), DriverError> {
        self.record(MockCall::SetParam(handle.device, key))?;
        let index = self.open_state(handle)?;
        if key.info != ParamInfo::Value {
            return Err(not_supported());
        }
        match key.param {
            Param::ImageDataFormat => {
                self.states[index].format = value;
                Ok(())
            }
            Param::Exposure => {
                let exposure = &mut self.devices[index].exposure;
                if value < exposure.1 || value > exposure.2 {
                    return Err(wrong_value());
                }
                exposure.0 = value;
                Ok(())
            }
            _ => Err(not_supported()),
        }
    }

    fn set_param_float(
        &mut self,
        handle: &MockHandle,
        key: ParamKey,
        value: f32,
    ) -> Result<(), DriverError> {
        self.record(MockCall::SetParam(handle.device, key))?;
        let index = self.open_state(handle)?;
        if key != Param::Gain.value() {
            return Err(not_supported());
        }
        let gain = &mut self.devices[index].gain;
        if value < gain.1 || value > gain.2 {
            return Err(wrong_value());
        }
        gain.0 = value;
        Ok(())
    }

    fn start_acquisition(&mut self, handle: &MockHandle) -> Result<(), DriverError> {
        self.record(MockCall::StartAcquisition(handle.device))?;
        let index = self.open_state(handle)?;
        let state = &mut self.states[index];
        if state.acquiring {
            return Err(DriverError::Status {
                code: status::INVALID_ARG,
            });
        }
        state.acquiring = true;
        state.sequence = 0;
        Ok(())
    }

    fn get_frame(&mut self, handle: &MockHandle, _timeout: Duration) -> Result<&[u16], DriverError> {
        self.record(MockCall::GetFrame(handle.device))?;
        let index = self.open_state(handle)?;
        if !self.states[index].acquiring {
            return Err(DriverError::Status {
                code: status::INVALID_ARG,
            });
        }

        let sequence = self.states[index].sequence;
        let pattern = self.pattern;
        let len = self.devices[index].pixel_count();
        self.buffer.clear();
        self.buffer.extend((0..len).map(|pixel| pattern(sequence, pixel)));
        self.states[index].sequence += 1;

        Ok(&self.buffer)
    }

    fn stop_acquisition(&mut self, handle: &MockHandle) -> Result<(), DriverError> {
        self.record(MockCall::StopAcquisition(handle.device))?;
        let index = self.open_state(handle)?;
        self.states[index].acquiring = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_lifecycle() {
        let mut driver = MockDriver::with_devices(2);
        assert_eq!(driver.device_count().unwrap(), 2);

        let handle = driver.open_device(1).unwrap();
        assert!(driver.is_device_open(1));
        assert!(!driver.is_device_open(0));

        driver.close_device(handle).unwrap();
        assert!(!driver.is_device_open(1));
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let mut driver = MockDriver::default();
        let _handle = driver.open_device(0).unwrap();

        assert!(driver.open_device(0).is_err());
        assert!(driver.open_device(5).is_err());
    }

    #[test]
    fn test_frames_follow_pattern() {
        let mut driver = MockDriver::new(vec![MockDevice::new().with_dimensions(4, 1)])
            .with_pattern(|seq, px| (seq * 10 + px as u64) as u16);
        let handle = driver.open_device(0).unwrap();
        driver.start_acquisition(&handle).unwrap();

        let timeout = Duration::from_millis(5);
        assert_eq!(driver.get_frame(&handle, timeout).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(driver.get_frame(&handle, timeout).unwrap(), &[10, 11, 12, 13]);

        driver.stop_acquisition(&handle).unwrap();
        assert!(driver.get_frame(&handle, timeout).is_err());
    }

    #[test]
    fn test_fault_fires_once_after_count() {
        let mut driver = MockDriver::default();
        driver.fail(MockCall::DeviceCount, 1, DriverError::Status { code: 57 });

        assert!(driver.device_count().is_ok());
        assert_eq!(
            driver.device_count(),
            Err(DriverError::Status { code: 57 })
        );
        assert!(driver.device_count().is_ok());
        assert_eq!(driver.calls().len(), 3);
    }

    #[test]
    fn test_exposure_write_is_range_checked() {
        let mut driver = MockDriver::new(vec![MockDevice::new().with_exposure(100, 50, 200)]);
        let handle = driver.open_device(0).unwrap();

        assert!(driver.set_param_int(&handle, Param::Exposure.value(), 150).is_ok());
        assert_eq!(
            driver.set_param_int(&handle, Param::Exposure.value(), 500),
            Err(wrong_value())
        );
        assert_eq!(
            driver.get_param_int(&handle, Param::Exposure.value()).unwrap(),
            150
        );
    }

    #[test]
    fn test_name_is_truncated_on_char_boundary() {
        let mut driver = MockDriver::new(vec![MockDevice::new().with_name("xiQé")]);
        let handle = driver.open_device(0).unwrap();

        let name = driver
            .get_param_string(&handle, Param::DeviceName.value(), 4)
            .unwrap();
        assert_eq!(name, "xiQ");
    }
}
