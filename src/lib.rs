// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Simulate the visibilities a radio interferometer measures of a sky model, and
make images from them.
 */

pub mod constants;
pub mod correlate;
pub mod dftw;
pub mod error;
pub mod imager;
pub mod interferometer;
pub mod jones;
pub mod mem;
pub mod run_log;
pub mod sky;
pub mod telescope;

mod cli;
#[cfg(any(feature = "cuda", feature = "hip"))]
pub(crate) mod gpu;
pub(crate) mod math;

use crossbeam_utils::atomic::AtomicCell;

/// Should progress bars be drawn? This is set by the binary; progress bars
/// are hidden by default.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use cli::{Oskar, OskarError};
pub use error::{ErrorCode, KernelError};
pub use imager::{Imager, ImagerError, ImagerSettings};
pub use interferometer::{Observation, SimulationError, Simulator, VisBlock};
pub use mem::{Location, Mem, Precision};
pub use run_log::RunLog;
pub use sky::{Sky, Source};
pub use telescope::{ElementPattern, Telescope};
