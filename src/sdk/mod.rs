//! m3api binding.
//!
//! [`XiApiDriver`] implements [`CameraDriver`] on top of the raw
//! `xiapi-sys` functions. Only compiled with the `xiapi` feature; the
//! vendor library must be installed for the binary to link.

#![allow(unsafe_code)]

use crate::capture::{CameraDriver, DriverError, ParamKey};
use std::ffi::{c_void, CString};
use std::time::Duration;
use xiapi_sys::{
    xiCloseDevice, xiGetImage, xiGetNumberDevices, xiGetParamFloat, xiGetParamInt,
    xiGetParamString, xiOpenDevice, xiSetParamFloat, xiSetParamInt, xiStartAcquisition,
    xiStopAcquisition, HANDLE, XI_IMG,
};

/// Open m3api device.
#[derive(Debug)]
pub struct XiHandle(HANDLE);

/// Driver backed by the installed XIMEA API.
pub struct XiApiDriver {
    image: XI_IMG,
}

impl Default for XiApiDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl XiApiDriver {
    /// Creates a driver with an empty image descriptor.
    pub fn new() -> Self {
        // SAFETY: XI_IMG is a plain C struct; all-zero is its documented
        // initial state apart from `size`.
        let mut image: XI_IMG = unsafe { std::mem::zeroed() };
        image.size = std::mem::size_of::<XI_IMG>() as _;
        Self { image }
    }
}

fn param_name(key: ParamKey) -> Result<CString, DriverError> {
    CString::new(key.to_string()).map_err(|_| DriverError::Status {
        code: crate::capture::status::INVALID_ARG,
    })
}

impl CameraDriver for XiApiDriver {
    type Handle = XiHandle;

    fn device_count(&mut self) -> Result<u32, DriverError> {
        let mut count = 0;
        DriverError::check(unsafe { xiGetNumberDevices(&mut count) } as i32)?;
        Ok(count as u32)
    }

    fn open_device(&mut self, index: u32) -> Result<XiHandle, DriverError> {
        let mut handle: HANDLE = std::ptr::null_mut();
        DriverError::check(unsafe { xiOpenDevice(index as _, &mut handle) } as i32)?;
        Ok(XiHandle(handle))
    }

    fn close_device(&mut self, handle: XiHandle) -> Result<(), DriverError> {
        DriverError::check(unsafe { xiCloseDevice(handle.0) } as i32)
    }

    fn get_param_int(&mut self, handle: &XiHandle, key: ParamKey) -> Result<i32, DriverError> {
        let name = param_name(key)?;
        let mut value = 0;
        DriverError::check(unsafe { xiGetParamInt(handle.0, name.as_ptr(), &mut value) } as i32)?;
        Ok(value as i32)
    }

    fn get_param_float(&mut self, handle: &XiHandle, key: ParamKey) -> Result<f32, DriverError> {
        let name = param_name(key)?;
        let mut value = 0.0;
        DriverError::check(
            unsafe { xiGetParamFloat(handle.0, name.as_ptr(), &mut value) } as i32,
        )?;
        Ok(value as f32)
    }

    fn get_param_string(
        &mut self,
        handle: &XiHandle,
        key: ParamKey,
        max_len: usize,
    ) -> Result<String, DriverError> {
        let name = param_name(key)?;
        // One extra byte for the terminator.
        let mut buffer = vec![0u8; max_len + 1];
        DriverError::check(unsafe {
            xiGetParamString(
                handle.0,
                name.as_ptr(),
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len() as _,
            )
        } as i32)?;
        let end = buffer.iter().position(|&b| b == 0).unwrap_or(max_len).min(max_len);
        buffer.truncate(end);
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn set_param_int(
        &mut self,
        handle: &XiHandle,
        key: ParamKey,
        value: i32,
    ) -> Result<(), DriverError> {
        let name = param_name(key)?;
        DriverError::check(unsafe { xiSetParamInt(handle.0, name.as_ptr(), value as _) } as i32)
    }

    fn set_param_float(
        &mut self,
        handle: &XiHandle,
        key: ParamKey,
        value: f32,
    ) -> Result<(), DriverError> {
        let name = param_name(key)?;
        DriverError::check(unsafe { xiSetParamFloat(handle.0, name.as_ptr(), value as _) } as i32)
    }

    fn start_acquisition(&mut self, handle: &XiHandle) -> Result<(), DriverError> {
        DriverError::check(unsafe { xiStartAcquisition(handle.0) } as i32)
    }

    fn get_frame(&mut self, handle: &XiHandle, timeout: Duration) -> Result<&[u16], DriverError> {
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128);
        DriverError::check(
            unsafe { xiGetImage(handle.0, timeout_ms as _, &mut self.image) } as i32,
        )?;

        let samples = (self.image.width as usize) * (self.image.height as usize);
        if self.image.bp.is_null() || (self.image.bp_size as usize) < samples * 2 {
            return Err(DriverError::Status {
                code: crate::capture::status::INVALID_ARG,
            });
        }
        // SAFETY: the API owns `bp` and keeps it valid until the next
        // xiGetImage on this descriptor, which needs `&mut self`.
        Ok(unsafe { std::slice::from_raw_parts(self.image.bp as *const u16, samples) })
    }

    fn stop_acquisition(&mut self, handle: &XiHandle) -> Result<(), DriverError> {
        DriverError::check(unsafe { xiStopAcquisition(handle.0) } as i32)
    }
}
