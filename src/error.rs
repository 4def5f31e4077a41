// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Status codes shared by every kernel, and the error type that carries them.
//!
//! Each public operation returns a [`Result`]; the first failure short-circuits
//! the rest of a pipeline via `?`. Every error can be reduced to an
//! [`ErrorCode`], whose integer value is what the binary exits with.

use thiserror::Error;

use crate::mem::{Location, MemType};

/// The numeric status code space. `0` is reserved for success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ErrorCode {
    InvalidArgument,
    BadLocation,
    TypeMismatch,
    DimensionMismatch,
    MemoryNotAllocated,
    AllocFailure,
    BackendUnavailable,
    UnsupportedConfiguration,
    BackendFailure,
    FileIo,
}

impl ErrorCode {
    /// The status code returned to the outside world. Never 0.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::InvalidArgument => 1,
            ErrorCode::BadLocation => 2,
            ErrorCode::TypeMismatch => 3,
            ErrorCode::DimensionMismatch => 4,
            ErrorCode::MemoryNotAllocated => 5,
            ErrorCode::AllocFailure => 6,
            ErrorCode::BackendUnavailable => 7,
            ErrorCode::UnsupportedConfiguration => 8,
            ErrorCode::BackendFailure => 9,
            ErrorCode::FileIo => 10,
        }
    }
}

/// Errors from the numeric kernels and the buffers they operate on.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Buffer '{name}' is in {actual} memory, but {expected} memory was required")]
    BadLocation {
        name: &'static str,
        expected: Location,
        actual: Location,
    },

    #[error("Buffer '{name}' has type {actual}, but {expected} was required")]
    TypeMismatch {
        name: &'static str,
        expected: String,
        actual: MemType,
    },

    #[error("Buffer '{name}' holds {actual} elements, but at least {required} are required")]
    DimensionMismatch {
        name: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Buffer '{0}' does not own any memory")]
    MemoryNotAllocated(&'static str),

    #[error("Couldn't allocate {bytes} bytes")]
    AllocFailure { bytes: usize },

    #[error("{0} support was not compiled into this build")]
    BackendUnavailable(&'static str),

    #[error("No kernel exists for {0}")]
    UnsupportedConfiguration(String),

    #[cfg(any(feature = "cuda", feature = "hip"))]
    #[error(transparent)]
    Gpu(#[from] crate::gpu::GpuError),
}

impl KernelError {
    pub fn code(&self) -> ErrorCode {
        match self {
            KernelError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            KernelError::BadLocation { .. } => ErrorCode::BadLocation,
            KernelError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            KernelError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            KernelError::MemoryNotAllocated(_) => ErrorCode::MemoryNotAllocated,
            KernelError::AllocFailure { .. } => ErrorCode::AllocFailure,
            KernelError::BackendUnavailable(_) => ErrorCode::BackendUnavailable,
            KernelError::UnsupportedConfiguration(_) => ErrorCode::UnsupportedConfiguration,
            #[cfg(any(feature = "cuda", feature = "hip"))]
            KernelError::Gpu(_) => ErrorCode::BackendFailure,
        }
    }
}
