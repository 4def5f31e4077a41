// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all oskar-related errors. This should be the *only* error
//! enum that is publicly visible from the CLI.

use thiserror::Error;

use super::{
    beam_pattern::BeamPatternArgsError, common::CommonArgsError, simulate::SimulateArgsError,
};
use crate::{
    error::{ErrorCode, KernelError},
    imager::ImagerError,
    interferometer::SimulationError,
    telescope::TelescopeError,
};

/// The *only* publicly visible error from the oskar binary. Every variant
/// maps onto an [`ErrorCode`], which is what the process exits with.
#[derive(Error, Debug)]
pub enum OskarError {
    /// An error related to simulate.
    #[error("{0}")]
    Simulate(String),

    /// An error related to beam-pattern.
    #[error("{0}")]
    BeamPattern(String),

    /// An error describing the telescope.
    #[error("{0}")]
    Telescope(String),

    /// An error from the imager.
    #[error("{0}")]
    Imager(String, ErrorCode),

    /// An error from the DFT and correlation kernels, or the buffers they
    /// use.
    #[error("{0}")]
    Kernel(String, ErrorCode),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// An IO error.
    #[error("{0}")]
    IO(String),

    /// A catch-all for anything else, e.g. a thread that panicked.
    #[error("{0}")]
    Generic(String),
}

impl OskarError {
    /// The status code that describes this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            OskarError::Simulate(_)
            | OskarError::BeamPattern(_)
            | OskarError::Telescope(_)
            | OskarError::ArgFile(_)
            | OskarError::Generic(_) => ErrorCode::InvalidArgument,
            OskarError::Imager(_, c) | OskarError::Kernel(_, c) => *c,
            OskarError::Cfitsio(_) | OskarError::IO(_) => ErrorCode::FileIo,
        }
    }
}

// Binary sub-command errors.

impl From<SimulateArgsError> for OskarError {
    fn from(e: SimulateArgsError) -> Self {
        Self::Simulate(e.to_string())
    }
}

impl From<BeamPatternArgsError> for OskarError {
    fn from(e: BeamPatternArgsError) -> Self {
        Self::BeamPattern(e.to_string())
    }
}

impl From<CommonArgsError> for OskarError {
    fn from(e: CommonArgsError) -> Self {
        let s = e.to_string();
        match e {
            CommonArgsError::IO(e) => Self::from(e),
            CommonArgsError::BadPrecision(_) => Self::Generic(s),
            _ => Self::Telescope(s),
        }
    }
}

// Library code errors.

impl From<TelescopeError> for OskarError {
    fn from(e: TelescopeError) -> Self {
        Self::Telescope(e.to_string())
    }
}

impl From<KernelError> for OskarError {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e.to_string(), e.code())
    }
}

impl From<SimulationError> for OskarError {
    fn from(e: SimulationError) -> Self {
        let s = e.to_string();
        match e {
            SimulationError::Kernel(e) => Self::from(e),
            _ => Self::Simulate(s),
        }
    }
}

impl From<ImagerError> for OskarError {
    fn from(e: ImagerError) -> Self {
        let s = e.to_string();
        let code = e.code();
        match e {
            ImagerError::Fitsio(_) => Self::Cfitsio(s),
            ImagerError::IO(e) => Self::from(e),
            ImagerError::Kernel(e) => Self::from(e),
            _ => Self::Imager(s, code),
        }
    }
}

impl From<fitsio::errors::Error> for OskarError {
    fn from(e: fitsio::errors::Error) -> Self {
        Self::Cfitsio(e.to_string())
    }
}

impl From<std::io::Error> for OskarError {
    fn from(e: std::io::Error) -> Self {
        Self::IO(e.to_string())
    }
}
