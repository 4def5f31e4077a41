// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use marlu::{c64, Jones};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::ImagerError;
use crate::{constants::*, mem::Precision};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ImagingAlgorithm {
    /// Direct Fourier transform of every visibility onto every pixel, without
    /// the w term.
    #[strum(serialize = "dft2d")]
    Dft2d,

    /// Direct Fourier transform including the w term.
    #[strum(serialize = "dft3d")]
    Dft3d,

    /// Gridding followed by an FFT.
    #[default]
    #[strum(serialize = "fft")]
    Fft,

    /// Gridding with w-dependent kernels followed by an FFT.
    #[strum(serialize = "wproj")]
    WProjection,
}

impl ImagingAlgorithm {
    pub fn is_dft(self) -> bool {
        matches!(self, ImagingAlgorithm::Dft2d | ImagingAlgorithm::Dft3d)
    }
}

/// The convolution kernel used by the [`ImagingAlgorithm::Fft`] algorithm.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum GridKernelType {
    #[strum(serialize = "pillbox")]
    Pillbox,

    #[default]
    #[strum(serialize = "spheroidal")]
    Spheroidal,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Polarisation {
    I,
    Q,
    U,
    V,
    XX,
    XY,
    YX,
    YY,
}

impl Polarisation {
    /// Form this polarisation product from a matrix visibility.
    pub fn from_jones(self, j: &Jones<f64>) -> c64 {
        let (xx, xy, yx, yy) = (j[0], j[1], j[2], j[3]);
        match self {
            Polarisation::I => (xx + yy) * 0.5,
            Polarisation::Q => (xx - yy) * 0.5,
            Polarisation::U => (xy + yx) * 0.5,
            Polarisation::V => (xy - yx) * c64::new(0.0, -0.5),
            Polarisation::XX => xx,
            Polarisation::XY => xy,
            Polarisation::YX => yx,
            Polarisation::YY => yy,
        }
    }

    /// Form this polarisation product from a scalar visibility. Only Stokes I
    /// is available.
    pub fn from_scalar(self, v: c64) -> Option<c64> {
        match self {
            Polarisation::I => Some(v),
            _ => None,
        }
    }
}

/// Everything that controls how images are made. Every field has a default,
/// so this can be deserialised from a partial argument file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagerSettings {
    /// The side length of output images \[pixels\].
    pub image_size: usize,

    /// The field of view of output images \[degrees\].
    pub fov_deg: f64,

    pub algorithm: ImagingAlgorithm,

    pub kernel: GridKernelType,

    /// The oversampling factor of W-projection kernels.
    pub oversample: usize,

    /// The half-width of W-projection kernels \[grid cells\].
    pub support: usize,

    pub num_w_planes: usize,

    /// The largest |w| covered by the W-projection planes \[wavelengths\]. If
    /// this isn't given, it is taken from the first block of visibilities.
    pub w_max: Option<f64>,

    /// Grids are this factor larger than the images cut from them.
    pub padding: f64,

    pub precision: Precision,

    pub polarisations: Vec<Polarisation>,

    pub num_channels: usize,

    /// The frequency of channel 0 \[Hz\]. Output FITS headers use this and
    /// `freq_inc_hz` for their frequency axis; without them, the axis is
    /// derived from the frequencies of the updated channels.
    pub freq_start_hz: Option<f64>,

    /// The frequency separation of adjacent channels \[Hz\].
    pub freq_inc_hz: Option<f64>,

    /// Scale the images by the number of input files (i.e. sum rather than
    /// average over files).
    pub scale_norm_with_num_input_files: bool,

    /// Run direct Fourier transforms on the GPU.
    pub use_gpu: bool,

    /// Output FITS files are named after this, e.g. `<root>_I.fits`. Nothing
    /// is written if this isn't given.
    pub output_root: Option<PathBuf>,

    pub want_images: bool,

    pub want_grids: bool,
}

impl Default for ImagerSettings {
    fn default() -> Self {
        ImagerSettings {
            image_size: DEFAULT_IMAGE_SIZE,
            fov_deg: DEFAULT_FOV_DEG,
            algorithm: ImagingAlgorithm::default(),
            kernel: GridKernelType::default(),
            oversample: DEFAULT_OVERSAMPLE,
            support: DEFAULT_SUPPORT,
            num_w_planes: DEFAULT_NUM_W_PLANES,
            w_max: None,
            padding: 1.0,
            precision: Precision::Double,
            polarisations: vec![Polarisation::I],
            num_channels: 1,
            freq_start_hz: None,
            freq_inc_hz: None,
            scale_norm_with_num_input_files: false,
            use_gpu: false,
            output_root: None,
            want_images: true,
            want_grids: false,
        }
    }
}

impl ImagerSettings {
    /// The side length of the planes being accumulated. For the DFT
    /// algorithms this is the image size, otherwise it is the padded image
    /// size rounded up to an even number.
    pub fn plane_size(&self) -> usize {
        if self.algorithm.is_dft() {
            return self.image_size;
        }
        let padded = ((self.image_size as f64 * self.padding).ceil() as usize).max(self.image_size);
        padded + padded % 2
    }

    /// The angular size of an image pixel \[radians\].
    pub fn cellsize_rad(&self) -> f64 {
        self.fov_deg.to_radians() / self.image_size as f64
    }

    pub fn num_planes(&self) -> usize {
        self.num_channels * self.polarisations.len()
    }

    pub(super) fn validate(&self) -> Result<(), ImagerError> {
        let bad = |s: String| Err(ImagerError::InvalidSettings(s));
        if self.image_size == 0 || self.image_size % 2 != 0 {
            return bad(format!(
                "The image size must be a positive even number; got {}",
                self.image_size
            ));
        }
        if !(self.fov_deg > 0.0 && self.fov_deg < 180.0) {
            return bad(format!(
                "The field of view must be between 0 and 180 degrees; got {}",
                self.fov_deg
            ));
        }
        if self.polarisations.is_empty() {
            return bad("No polarisations were requested".to_string());
        }
        if self.num_channels == 0 {
            return bad("The number of channels must be at least 1".to_string());
        }
        if !(self.padding >= 1.0) {
            return bad(format!("The padding must be at least 1; got {}", self.padding));
        }
        if self.algorithm == ImagingAlgorithm::WProjection {
            if self.oversample == 0 || self.support == 0 || self.num_w_planes == 0 {
                return bad(
                    "The W-projection oversampling, support and number of planes must all be at least 1"
                        .to_string(),
                );
            }
            if let Some(w_max) = self.w_max {
                if !(w_max > 0.0) {
                    return bad(format!("w_max must be positive; got {w_max}"));
                }
            }
        }
        Ok(())
    }
}
