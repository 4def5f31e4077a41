// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all imager-related errors.

use thiserror::Error;

use super::{ImagerState, Polarisation};
use crate::error::{ErrorCode, KernelError};

#[derive(Error, Debug)]
pub enum ImagerError {
    #[error("The imager is {actual}, but it must be {expected} for this operation")]
    InvalidState {
        expected: &'static str,
        actual: ImagerState,
    },

    #[error("{0}")]
    InvalidSettings(String),

    #[error("Polarisation {0} cannot be formed from scalar visibilities; only I is available")]
    PolarisationUnavailable(Polarisation),

    #[error("Channel index {got} is out of range; the imager has {num_channels} channels")]
    BadChannel { got: usize, num_channels: usize },

    #[error("Got {num_uvws} baseline UVWs, {num_vis} visibilities and {num_weights} weights; these must be equal")]
    BlockShape {
        num_uvws: usize,
        num_vis: usize,
        num_weights: usize,
    },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Fitsio(#[from] fitsio::errors::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl ImagerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ImagerError::InvalidState { .. }
            | ImagerError::InvalidSettings(_)
            | ImagerError::BadChannel { .. } => ErrorCode::InvalidArgument,
            ImagerError::PolarisationUnavailable(_) => ErrorCode::UnsupportedConfiguration,
            ImagerError::BlockShape { .. } => ErrorCode::DimensionMismatch,
            ImagerError::Kernel(e) => e.code(),
            ImagerError::Fitsio(_) | ImagerError::IO(_) => ErrorCode::FileIo,
        }
    }
}
