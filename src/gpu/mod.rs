// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! GPU code used by the DFT and correlation kernels.
//!
//! All kernels are compiled for both single and double precision; which one
//! runs depends on the precision of the [`Mem`](crate::mem::Mem) buffers
//! handed over.

#![allow(non_snake_case)]
#![allow(clippy::upper_case_acronyms)]

#[cfg(test)]
mod tests;
mod utils;

use std::{
    ffi::{c_char, c_int, c_void, CStr},
    panic::Location,
    ptr::null_mut,
};

use strum_macros::Display;
use thiserror::Error;

pub(crate) use utils::get_device_info;

use crate::mem::Precision;

// Import CUDA/HIP functions into the same names.
#[cfg(feature = "cuda")]
use cuda_runtime_sys::{
    cudaDeviceSynchronize as gpuDeviceSynchronize, cudaError::cudaSuccess as gpuSuccess,
    cudaFree as gpuFree, cudaGetErrorString as gpuGetErrorString,
    cudaGetLastError as gpuGetLastError, cudaMalloc as gpuMalloc, cudaMemcpy as gpuMemcpy,
    cudaMemcpyKind::cudaMemcpyDeviceToDevice as gpuMemcpyDeviceToDevice,
    cudaMemcpyKind::cudaMemcpyDeviceToHost as gpuMemcpyDeviceToHost,
    cudaMemcpyKind::cudaMemcpyHostToDevice as gpuMemcpyHostToDevice,
};
#[cfg(feature = "hip")]
use hip_sys::hiprt::{
    hipDeviceSynchronize as gpuDeviceSynchronize, hipError_t::hipSuccess as gpuSuccess,
    hipFree as gpuFree, hipGetErrorString as gpuGetErrorString, hipGetLastError as gpuGetLastError,
    hipMalloc as gpuMalloc, hipMemcpy as gpuMemcpy,
    hipMemcpyKind::hipMemcpyDeviceToDevice as gpuMemcpyDeviceToDevice,
    hipMemcpyKind::hipMemcpyDeviceToHost as gpuMemcpyDeviceToHost,
    hipMemcpyKind::hipMemcpyHostToDevice as gpuMemcpyHostToDevice,
};

// Bindings to kernels.cu. Every function returns a null pointer on success,
// otherwise a pointer to the GPU runtime's error string.
extern "C" {
    pub(crate) fn oskar_scale_real_f(
        data: *mut f32,
        factor: f32,
        offset: c_int,
        num: c_int,
    ) -> *const c_char;

    pub(crate) fn oskar_scale_real_d(
        data: *mut f64,
        factor: f64,
        offset: c_int,
        num: c_int,
    ) -> *const c_char;

    pub(crate) fn oskar_dftw_f(
        mode: c_int,
        is_3d: c_int,
        num_in: c_int,
        wavenumber: f32,
        weights_in: *const c_void,
        x_in: *const f32,
        y_in: *const f32,
        z_in: *const f32,
        offset_coord_out: c_int,
        num_out: c_int,
        x_out: *const f32,
        y_out: *const f32,
        z_out: *const f32,
        data: *const c_void,
        offset_out: c_int,
        output: *mut c_void,
        block_size: c_int,
        max_in_chunk: c_int,
    ) -> *const c_char;

    pub(crate) fn oskar_dftw_d(
        mode: c_int,
        is_3d: c_int,
        num_in: c_int,
        wavenumber: f64,
        weights_in: *const c_void,
        x_in: *const f64,
        y_in: *const f64,
        z_in: *const f64,
        offset_coord_out: c_int,
        num_out: c_int,
        x_out: *const f64,
        y_out: *const f64,
        z_out: *const f64,
        data: *const c_void,
        offset_out: c_int,
        output: *mut c_void,
        block_size: c_int,
        max_in_chunk: c_int,
    ) -> *const c_char;

    pub(crate) fn oskar_correlate_f(
        is_gaussian: c_int,
        is_matrix: c_int,
        num_sources: c_int,
        num_stations: c_int,
        num_baselines: c_int,
        baseline_p: *const c_int,
        baseline_q: *const c_int,
        jones: *const c_void,
        source_i: *const f32,
        source_q: *const f32,
        source_u: *const f32,
        source_v: *const f32,
        source_l: *const f32,
        source_m: *const f32,
        source_a: *const f32,
        source_b: *const f32,
        source_c: *const f32,
        station_u: *const f32,
        station_v: *const f32,
        frac_bandwidth: f32,
        vis: *mut c_void,
    ) -> *const c_char;

    pub(crate) fn oskar_correlate_d(
        is_gaussian: c_int,
        is_matrix: c_int,
        num_sources: c_int,
        num_stations: c_int,
        num_baselines: c_int,
        baseline_p: *const c_int,
        baseline_q: *const c_int,
        jones: *const c_void,
        source_i: *const f64,
        source_q: *const f64,
        source_u: *const f64,
        source_v: *const f64,
        source_l: *const f64,
        source_m: *const f64,
        source_a: *const f64,
        source_b: *const f64,
        source_c: *const f64,
        station_u: *const f64,
        station_v: *const f64,
        frac_bandwidth: f64,
        vis: *mut c_void,
    ) -> *const c_char;
}

/// Read an error string handed back by the GPU runtime or one of our kernels.
///
/// # Safety
///
/// `ptr` must point to a NUL-terminated string.
pub(crate) unsafe fn runtime_message(ptr: *const c_char) -> Box<str> {
    CStr::from_ptr(ptr).to_string_lossy().into()
}

/// Call one of the kernel wrappers in kernels.cu, converting a returned error
/// string into a [`GpuError::Kernel`].
macro_rules! gpu_kernel_call {
    ($gpu_fn:path, $($args:expr),* $(,)?) => {{
        #[allow(unused_unsafe)]
        let error_ptr = unsafe { $gpu_fn($($args),*) };
        if error_ptr.is_null() {
            Ok(())
        } else {
            Err($crate::gpu::GpuError::Kernel {
                kernel: stringify!($gpu_fn),
                msg: unsafe { $crate::gpu::runtime_message(error_ptr) },
                file: file!(),
                line: line!(),
            })
        }
    }};
}
pub(crate) use gpu_kernel_call;

/// Runtime operations that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GpuOp {
    #[strum(serialize = "allocation")]
    Alloc,
    #[strum(serialize = "copy to device")]
    Upload,
    #[strum(serialize = "copy from device")]
    Download,
    #[strum(serialize = "device-to-device copy")]
    DeviceCopy,
    #[strum(serialize = "memset")]
    Zero,
}

/// Wait for the device and turn any pending runtime error into a
/// [`GpuError::Runtime`] blamed on `op`.
#[track_caller]
unsafe fn sync(op: GpuOp) -> Result<(), GpuError> {
    let mut code = gpuDeviceSynchronize();
    if code == gpuSuccess {
        code = gpuGetLastError();
    }
    if code == gpuSuccess {
        return Ok(());
    }
    let location = Location::caller();
    Err(GpuError::Runtime {
        op,
        msg: runtime_message(gpuGetErrorString(code)),
        file: location.file(),
        line: location.line(),
    })
}

#[track_caller]
fn generic_error(msg: String) -> GpuError {
    let location = Location::caller();
    GpuError::Generic {
        msg: msg.into(),
        file: location.file(),
        line: location.line(),
    }
}

/// Untyped device memory, freed when dropped. Whatever owns the buffer keeps
/// track of the element type.
#[derive(Debug)]
pub(crate) struct DeviceBuffer {
    ptr: *mut c_void,
    /// \[bytes\]
    size: usize,
}

// Device addresses are valid from any host thread sharing the runtime context.
unsafe impl Send for DeviceBuffer {}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                gpuFree(self.ptr);
            }
        }
    }
}

impl Default for DeviceBuffer {
    fn default() -> Self {
        DeviceBuffer {
            ptr: null_mut(),
            size: 0,
        }
    }
}

impl DeviceBuffer {
    /// Allocate `size` bytes. The contents are undefined.
    #[track_caller]
    pub(crate) fn alloc(size: usize) -> Result<DeviceBuffer, GpuError> {
        let mut buf = DeviceBuffer::default();
        if size > 0 {
            unsafe {
                gpuMalloc(&mut buf.ptr, size);
                sync(GpuOp::Alloc)?;
            }
            buf.size = size;
        }
        Ok(buf)
    }

    /// Allocate `size` zeroed bytes.
    #[track_caller]
    pub(crate) fn zeroed(size: usize) -> Result<DeviceBuffer, GpuError> {
        let mut buf = DeviceBuffer::alloc(size)?;
        buf.zero()?;
        Ok(buf)
    }

    /// Copy a host slice of any element type to a new buffer.
    #[track_caller]
    pub(crate) fn upload<E>(v: &[E]) -> Result<DeviceBuffer, GpuError> {
        let mut buf = DeviceBuffer::alloc(std::mem::size_of_val(v))?;
        if buf.size > 0 {
            unsafe {
                gpuMemcpy(buf.ptr, v.as_ptr().cast(), buf.size, gpuMemcpyHostToDevice);
                sync(GpuOp::Upload)?;
            }
        }
        Ok(buf)
    }

    /// Copy the whole buffer into a host slice of exactly the same number of
    /// bytes.
    #[track_caller]
    pub(crate) fn download<E>(&self, v: &mut [E]) -> Result<(), GpuError> {
        let size = std::mem::size_of_val(v);
        if size != self.size {
            return Err(generic_error(format!(
                "Can't download a device buffer of {} bytes into {size} bytes",
                self.size
            )));
        }
        if size == 0 {
            return Ok(());
        }
        if self.ptr.is_null() {
            return Err(generic_error("Can't download from a null device pointer".into()));
        }
        unsafe {
            gpuMemcpy(v.as_mut_ptr().cast(), self.ptr, size, gpuMemcpyDeviceToHost);
            sync(GpuOp::Download)
        }
    }

    /// Overwrite the first `size` bytes of this buffer with the first `size`
    /// bytes of `src`.
    #[track_caller]
    pub(crate) fn copy_prefix_from(&mut self, src: &DeviceBuffer, size: usize) -> Result<(), GpuError> {
        if size > src.size || size > self.size {
            return Err(generic_error(format!(
                "Can't copy {size} bytes from a device buffer of {} bytes into one of {} bytes",
                src.size, self.size
            )));
        }
        if size == 0 {
            return Ok(());
        }
        unsafe {
            gpuMemcpy(self.ptr, src.ptr, size, gpuMemcpyDeviceToDevice);
            sync(GpuOp::DeviceCopy)
        }
    }

    #[track_caller]
    pub(crate) fn try_clone(&self) -> Result<DeviceBuffer, GpuError> {
        let mut new = DeviceBuffer::alloc(self.size)?;
        new.copy_prefix_from(self, self.size)?;
        Ok(new)
    }

    #[track_caller]
    pub(crate) fn zero(&mut self) -> Result<(), GpuError> {
        #[cfg(feature = "cuda")]
        use cuda_runtime_sys::cudaMemset as gpuMemset;
        #[cfg(feature = "hip")]
        use hip_sys::hiprt::hipMemset as gpuMemset;

        if self.size == 0 {
            return Ok(());
        }
        unsafe {
            gpuMemset(self.ptr, 0, self.size);
            sync(GpuOp::Zero)
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub(crate) fn as_ptr(&self) -> *const c_void {
        self.ptr
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_void {
        self.ptr
    }
}

/// Multiply `num` real scalars, starting at scalar `offset`, by `factor`.
pub(crate) fn scale_real(
    d: &mut DeviceBuffer,
    precision: Precision,
    factor: f64,
    offset: usize,
    num: usize,
) -> Result<(), GpuError> {
    if num == 0 {
        return Ok(());
    }
    match precision {
        Precision::Single => gpu_kernel_call!(
            oskar_scale_real_f,
            d.as_mut_ptr().cast(),
            factor as f32,
            offset as c_int,
            num as c_int,
        ),
        Precision::Double => gpu_kernel_call!(
            oskar_scale_real_d,
            d.as_mut_ptr().cast(),
            factor,
            offset as c_int,
            num as c_int,
        ),
    }
}

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("{file}:{line}: GPU {op} failed: {msg}")]
    Runtime {
        op: GpuOp,
        msg: Box<str>,
        file: &'static str,
        line: u32,
    },

    #[error("{file}:{line}: {kernel} failed: {msg}")]
    Kernel {
        kernel: &'static str,
        msg: Box<str>,
        file: &'static str,
        line: u32,
    },

    #[error("{file}:{line}: {msg}")]
    Generic {
        msg: Box<str>,
        file: &'static str,
        line: u32,
    },
}
