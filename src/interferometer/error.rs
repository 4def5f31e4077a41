// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::error::{ErrorCode, KernelError};

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("The channel width must be positive, but got {0} Hz")]
    BadChannelWidth(f64),

    #[error("Channel frequencies must be positive, but got {0} Hz")]
    BadFrequency(f64),

    #[error("The visibility consumer has stopped")]
    ConsumerStopped,

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl SimulationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SimulationError::BadChannelWidth(_)
            | SimulationError::BadFrequency(_)
            | SimulationError::ConsumerStopped => ErrorCode::InvalidArgument,
            SimulationError::Kernel(e) => e.code(),
        }
    }
}
