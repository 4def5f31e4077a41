// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Kernels convert to single precision
only when a single-precision buffer is handed to them.
 */

pub use marlu::constants::VEL_C;
pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// The default side length of output images \[pixels\].
pub const DEFAULT_IMAGE_SIZE: usize = 256;

/// The default field of view of output images \[degrees\].
pub const DEFAULT_FOV_DEG: f64 = 2.0;

/// The default oversampling factor of W-projection kernels.
pub const DEFAULT_OVERSAMPLE: usize = 4;

/// The default half-width of W-projection kernels \[grid cells\].
pub const DEFAULT_SUPPORT: usize = 4;

/// The default number of W-projection planes.
pub const DEFAULT_NUM_W_PLANES: usize = 16;

/// The half-width of the prolate-spheroidal gridding kernel \[grid cells\].
pub const SPHEROIDAL_SUPPORT: usize = 3;

/// The number of samples of W-projection kernels taken across the image
/// plane before transforming.
pub const W_KERNEL_IMAGE_SAMPLES: usize = 64;

/// The default Earth position of the array (the Murchison Radio-astronomy
/// Observatory).
pub const DEFAULT_ARRAY_LONG_DEG: f64 = 116.67081523611111;
pub const DEFAULT_ARRAY_LAT_DEG: f64 = -26.703319405555554;
pub const DEFAULT_ARRAY_HEIGHT_M: f64 = 377.827;

/// Converts a Gaussian's full width at half maximum to its standard
/// deviation: `1 / (2 sqrt(2 ln 2))`.
pub const FWHM_TO_SIGMA: f64 = 0.42466090014400953;

/// The default start epoch of simulations, as a GPS time \[seconds\].
pub const DEFAULT_START_GPS_SECONDS: f64 = 1_090_008_640.0;

/// The default number of time steps in a simulation.
pub const DEFAULT_NUM_TIMESTEPS: usize = 1;

/// The default time resolution of a simulation \[seconds\].
pub const DEFAULT_TIME_RES_SECONDS: f64 = 8.0;

/// The default frequency of the first channel of a simulation \[MHz\].
pub const DEFAULT_START_FREQ_MHZ: f64 = 150.0;

/// The default channel width (and separation) of a simulation \[kHz\].
pub const DEFAULT_FREQ_RES_KHZ: f64 = 40.0;

/// The default number of channels in a simulation.
pub const DEFAULT_NUM_CHANNELS: usize = 1;

/// The default root of image file names written by `simulate`. Files are
/// named `<root>_<POL>.fits`.
pub const DEFAULT_OUTPUT_IMAGE_ROOT: &str = "oskar_image";

/// The default file written by `beam-pattern`.
pub const DEFAULT_BEAM_PATTERN_FILENAME: &str = "beam_pattern.fits";
