// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Querying the GPU that kernels run on.

use std::{
    ffi::{c_char, c_int, CStr},
    panic::Location,
};

use super::GpuError;

extern "C" {
    /// Defined in utils.cu. `name` must hold 256 bytes.
    fn get_gpu_device_info(
        device: c_int,
        name: *mut c_char,
        device_major: *mut c_int,
        device_minor: *mut c_int,
        total_global_mem: *mut usize,
        driver_version: *mut c_int,
        runtime_version: *mut c_int,
    ) -> *const c_char;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "cuda")] {
        const RUNTIME: &str = "CUDA";
    } else {
        const RUNTIME: &str = "HIP";
    }
}

/// The device that kernels run on (always device 0) and the versions of the
/// GPU runtime.
#[derive(Debug, Clone)]
pub(crate) struct DeviceInfo {
    pub(crate) name: String,
    pub(crate) capability: (i32, i32),
    /// \[MiB\]
    pub(crate) total_global_mem: usize,
    pub(crate) driver_version: i32,
    pub(crate) runtime_version: i32,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor) = self.capability;
        write!(
            f,
            "{} (capability {major}.{minor}, {} MiB), {RUNTIME} driver {}, runtime {}",
            self.name,
            self.total_global_mem,
            format_version(self.driver_version),
            format_version(self.runtime_version),
        )
    }
}

/// CUDA encodes versions as 1000 * major + 10 * minor, HIP as 10000000 *
/// major + 100000 * minor + patch.
fn format_version(v: i32) -> String {
    if cfg!(feature = "hip") {
        format!("{}.{}", v / 10_000_000, (v / 100_000) % 100)
    } else {
        format!("{}.{}", v / 1000, (v / 10) % 100)
    }
}

pub(crate) fn get_device_info() -> Result<DeviceInfo, GpuError> {
    let mut name = [0 as c_char; 256];
    let mut major = 0;
    let mut minor = 0;
    let mut total_global_mem = 0;
    let mut driver_version = 0;
    let mut runtime_version = 0;
    unsafe {
        let error_ptr = get_gpu_device_info(
            0,
            name.as_mut_ptr(),
            &mut major,
            &mut minor,
            &mut total_global_mem,
            &mut driver_version,
            &mut runtime_version,
        );
        if !error_ptr.is_null() {
            let msg = CStr::from_ptr(error_ptr).to_string_lossy();
            let location = Location::caller();
            return Err(GpuError::Generic {
                msg: format!("{RUNTIME} device query failed: {msg}").into(),
                file: location.file(),
                line: location.line(),
            });
        }

        Ok(DeviceInfo {
            name: CStr::from_ptr(name.as_ptr()).to_string_lossy().into_owned(),
            capability: (major, minor),
            total_global_mem: total_global_mem / (1024 * 1024),
            driver_version,
            runtime_version,
        })
    }
}
