// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Making images from visibilities.
//!
//! An [`Imager`] accumulates blocks of visibilities into one plane per
//! channel and polarisation, either by direct Fourier transform or by
//! gridding. When everything has been accumulated, [`Imager::finalise`]
//! normalises the planes, transforms and corrects the grids, trims them to
//! the image size and writes them out.

mod dft;
mod error;
mod fits;
mod grid;
mod settings;

pub use error::ImagerError;
pub(crate) use fits::{write_cube, CubeHeader};
pub use settings::*;

use std::path::PathBuf;

use hifitime::Epoch;
use log::{debug, trace};
use marlu::{c64, RADec, UVW};
use strum_macros::Display;

use crate::{
    constants::{TAU, VEL_C},
    error::KernelError,
    math::{fftphase, Fft2d},
    mem::{Location, Mem, MemType, Precision, Real},
    run_log::RunLog,
};
use dft::DftPixels;
use grid::Gridder;

const TIMER_TOTAL: &str = "Imager";
const TIMER_INIT: &str = "Initialise";
const TIMER_UPDATE: &str = "Grid update";
const TIMER_FINALISE: &str = "Grid finalise";
const TIMER_READ: &str = "Read visibility data";
const TIMER_WRITE: &str = "Write image data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ImagerState {
    #[strum(serialize = "empty")]
    Empty,
    #[strum(serialize = "accumulating")]
    Accumulating,
    #[strum(serialize = "finalizing")]
    Finalizing,
    #[strum(serialize = "finalized")]
    Finalized,
}

/// The products of a finalised imager. Planes are indexed by
/// `channel * num_polarisations + polarisation` and are real, host buffers.
#[derive(Debug, Default)]
pub struct ImagerOutput {
    pub images: Vec<Mem>,
    pub grids: Vec<Mem>,
    /// The FITS files that were written.
    pub files: Vec<PathBuf>,
}

pub struct Imager {
    settings: ImagerSettings,
    phase_centre: RADec,
    obs_start: Option<Epoch>,
    state: ImagerState,

    plane_size: usize,
    cellsize_rad: f64,
    planes: Vec<Mem>,
    plane_norms: Vec<f64>,
    channel_freqs: Vec<Option<f64>>,
    num_input_files: usize,

    gridder: Option<Gridder>,
    dft_pixels: Option<DftPixels>,
    fft: Option<Fft2d>,
    correction: Option<Mem>,
    output: Option<ImagerOutput>,
}

impl Imager {
    pub fn new(
        settings: ImagerSettings,
        phase_centre: RADec,
        obs_start: Option<Epoch>,
    ) -> Result<Imager, ImagerError> {
        settings.validate()?;
        if settings.use_gpu {
            Location::Gpu.check_available()?;
        }
        Ok(Imager {
            plane_size: settings.plane_size(),
            cellsize_rad: settings.cellsize_rad(),
            settings,
            phase_centre,
            obs_start,
            state: ImagerState::Empty,
            planes: vec![],
            plane_norms: vec![],
            channel_freqs: vec![],
            num_input_files: 0,
            gridder: None,
            dft_pixels: None,
            fft: None,
            correction: None,
            output: None,
        })
    }

    pub fn settings(&self) -> &ImagerSettings {
        &self.settings
    }

    pub fn state(&self) -> ImagerState {
        self.state
    }

    pub fn plane_size(&self) -> usize {
        self.plane_size
    }

    /// The accumulated normalisation of each plane.
    pub fn plane_norms(&self) -> &[f64] {
        &self.plane_norms
    }

    /// Note that the following updates come from another input file.
    pub fn add_input_file(&mut self) {
        self.num_input_files += 1;
    }

    fn location(&self) -> Location {
        if self.settings.use_gpu {
            Location::Gpu
        } else {
            Location::Cpu
        }
    }

    /// Accumulate a block of visibilities for one channel. `uvws` are the
    /// baseline coordinates \[metres\], and `vis` holds one complex or matrix
    /// visibility per baseline. Without `weights`, every visibility has a
    /// weight of 1.
    pub fn update(
        &mut self,
        uvws: &[UVW],
        vis: &Mem,
        weights: Option<&[f64]>,
        channel: usize,
        freq_hz: f64,
        log: &mut RunLog,
    ) -> Result<(), ImagerError> {
        match self.state {
            ImagerState::Empty | ImagerState::Accumulating => (),
            actual => {
                return Err(ImagerError::InvalidState {
                    expected: "empty or accumulating",
                    actual,
                })
            }
        }
        if channel >= self.settings.num_channels {
            return Err(ImagerError::BadChannel {
                got: channel,
                num_channels: self.settings.num_channels,
            });
        }
        let num_weights = weights.map(|w| w.len()).unwrap_or(uvws.len());
        if vis.len() != uvws.len() || num_weights != uvws.len() {
            return Err(ImagerError::BlockShape {
                num_uvws: uvws.len(),
                num_vis: vis.len(),
                num_weights,
            });
        }

        log.timer_resume(TIMER_READ);
        let products = pol_products(vis, &self.settings.polarisations);
        log.timer_pause(TIMER_READ);
        let products = products?;

        let wavelength = VEL_C / freq_hz;
        if self.state == ImagerState::Empty {
            log.timer_resume(TIMER_TOTAL);
            log.timer_resume(TIMER_INIT);
            let result = self.allocate(uvws, wavelength);
            log.timer_pause(TIMER_INIT);
            result?;
        }
        self.channel_freqs[channel] = Some(freq_hz);
        trace!(
            "Imager update: channel {channel}, {} visibilities",
            uvws.len()
        );

        log.timer_resume(TIMER_UPDATE);
        let result = self.accumulate(uvws, &products, weights, channel, wavelength);
        log.timer_pause(TIMER_UPDATE);
        result
    }

    fn allocate(&mut self, uvws: &[UVW], wavelength: f64) -> Result<(), ImagerError> {
        let num_planes = self.settings.num_planes();
        let precision = self.settings.precision;
        let (mem_type, size) = if self.settings.algorithm.is_dft() {
            (MemType::real(precision), self.settings.image_size)
        } else {
            (MemType::complex(precision), self.plane_size)
        };
        debug!(
            "Allocating {num_planes} {} planes of {size}x{size} {mem_type}",
            self.settings.algorithm
        );
        self.planes = (0..num_planes)
            .map(|_| Mem::new(mem_type, Location::Cpu, size * size))
            .collect::<Result<_, _>>()?;
        self.plane_norms = vec![0.0; num_planes];
        self.channel_freqs = vec![None; self.settings.num_channels];
        self.output = None;

        if self.settings.algorithm.is_dft() {
            self.dft_pixels = Some(DftPixels::new(
                self.settings.image_size,
                self.cellsize_rad,
                self.settings.algorithm == ImagingAlgorithm::Dft3d,
                precision,
                self.location(),
            )?);
        } else {
            let w_max = uvws
                .iter()
                .map(|uvw| (uvw.w / wavelength).abs())
                .fold(0.0, f64::max);
            self.gridder = Some(Gridder::new(
                &self.settings,
                self.plane_size,
                self.cellsize_rad,
                if w_max > 0.0 { w_max } else { 1.0 },
            ));
        }
        self.state = ImagerState::Accumulating;
        Ok(())
    }

    fn accumulate(
        &mut self,
        uvws: &[UVW],
        products: &[Vec<c64>],
        weights: Option<&[f64]>,
        channel: usize,
        wavelength: f64,
    ) -> Result<(), ImagerError> {
        let num_pols = self.settings.polarisations.len();
        let unit_weights;
        let weights = match weights {
            Some(w) => w,
            None => {
                unit_weights = vec![1.0; uvws.len()];
                &unit_weights
            }
        };

        for (p, values) in products.iter().enumerate() {
            let index = channel * num_pols + p;
            let plane = &mut self.planes[index];
            if let Some(pixels) = &self.dft_pixels {
                let weighted = values
                    .iter()
                    .zip(weights)
                    .map(|(v, w)| *v * *w)
                    .collect();
                pixels.accumulate(uvws, weighted, TAU / wavelength, plane)?;
                self.plane_norms[index] += weights.iter().sum::<f64>();
            } else if let Some(gridder) = &self.gridder {
                let scale = self.plane_size as f64 * self.cellsize_rad;
                let args = (gridder, self.plane_size, scale, wavelength);
                let norm = match plane.precision() {
                    Precision::Single => grid_block::<f32>(args, plane, uvws, values, weights)?,
                    Precision::Double => grid_block::<f64>(args, plane, uvws, values, weights)?,
                };
                self.plane_norms[index] += norm;
            }
        }
        Ok(())
    }

    /// Normalise a plane by `plane_norm` and, for gridding algorithms, turn
    /// it from a grid into a grid-corrected image. Gridded planes must be
    /// complex and `plane_size * plane_size`.
    pub fn finalise_plane(&mut self, plane: &mut Mem, plane_norm: f64) -> Result<(), ImagerError> {
        if plane_norm != 0.0 {
            let len = plane.len();
            plane.scale_real(1.0 / plane_norm, 0, len)?;
        }
        if self.settings.algorithm.is_dft() {
            return Ok(());
        }

        let size = self.plane_size;
        let precision = plane.precision();
        let meta = plane.meta();
        meta.check_type("plane", MemType::complex(precision))?;
        if meta.len != size * size {
            return Err(KernelError::DimensionMismatch {
                name: "plane",
                required: size * size,
                actual: meta.len,
            }
            .into());
        }

        let fft = match self.fft.take() {
            Some(fft) if fft.precision() == precision => fft,
            _ => Fft2d::new(size, precision),
        };
        let correction = match self.correction.take() {
            Some(c) if c.precision() == precision => c,
            _ => {
                let gridder = self
                    .gridder
                    .get_or_insert_with(|| Gridder::new(&self.settings, size, self.cellsize_rad, 1.0));
                Mem::from_real(gridder.correction(size)).into_target(precision, Location::Cpu)?
            }
        };
        let result = match precision {
            Precision::Single => transform_and_correct::<f32>(plane, &fft, &correction, size),
            Precision::Double => transform_and_correct::<f64>(plane, &fft, &correction, size),
        };
        self.fft = Some(fft);
        self.correction = Some(correction);
        result?;
        Ok(())
    }

    /// Finish imaging: normalise, transform and trim every plane, then write
    /// any requested FITS files. Finalising again returns the same output
    /// without recomputing it. If finalising fails, the imager is reset.
    pub fn finalise(&mut self, log: &mut RunLog) -> Result<&ImagerOutput, ImagerError> {
        match self.state {
            ImagerState::Empty | ImagerState::Finalized => {
                return Ok(self.output.get_or_insert_with(ImagerOutput::default))
            }
            ImagerState::Finalizing => {
                return Err(ImagerError::InvalidState {
                    expected: "accumulating",
                    actual: self.state,
                })
            }
            ImagerState::Accumulating => (),
        }
        self.state = ImagerState::Finalizing;

        let mut norms = self.plane_norms.clone();
        if self.settings.scale_norm_with_num_input_files && self.num_input_files > 1 {
            let num_files = self.num_input_files as f64;
            norms.iter_mut().for_each(|n| *n /= num_files);
        }

        log.timer_resume(TIMER_FINALISE);
        let result = self.finalise_planes(&norms);
        log.timer_pause(TIMER_FINALISE);
        let mut output = match result {
            Ok(output) => output,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        // The timing summary goes into the HISTORY of the written files.
        log.timer_pause(TIMER_TOTAL);
        log.timing_summary(
            TIMER_TOTAL,
            &[TIMER_INIT, TIMER_UPDATE, TIMER_FINALISE, TIMER_READ],
        );

        if let Some(root) = self.settings.output_root.clone() {
            log.timer_resume(TIMER_WRITE);
            let result = self.write_fits(&root, &mut output, log);
            log.timer_pause(TIMER_WRITE);
            let write_time = log.timer_elapsed(TIMER_WRITE).as_secs_f64();
            log.info(format!("{TIMER_WRITE} took {write_time:.3} seconds"));
            if let Err(e) = result {
                self.reset();
                return Err(e);
            }
        }

        self.state = ImagerState::Finalized;
        Ok(self.output.insert(output))
    }

    fn finalise_planes(&mut self, norms: &[f64]) -> Result<ImagerOutput, ImagerError> {
        let mut output = ImagerOutput::default();
        let planes = std::mem::take(&mut self.planes);

        if self.settings.want_grids && !self.settings.algorithm.is_dft() {
            for (plane, &norm) in planes.iter().zip(norms) {
                let mut grid = plane.try_clone()?;
                if norm != 0.0 {
                    let len = grid.len();
                    grid.scale_real(1.0 / norm, 0, len)?;
                }
                grid.take_real_part()?;
                output.grids.push(grid);
            }
        }

        if self.settings.want_images {
            for (mut plane, &norm) in planes.into_iter().zip(norms) {
                self.finalise_plane(&mut plane, norm)?;
                trim_image(&mut plane, self.plane_size, self.settings.image_size)?;
                output.images.push(plane);
            }
        }
        Ok(output)
    }

    fn write_fits(
        &self,
        root: &std::path::Path,
        output: &mut ImagerOutput,
        log: &mut RunLog,
    ) -> Result<(), ImagerError> {
        let (freq_start_hz, freq_inc_hz) = self.freq_axis();
        let num_pols = self.settings.polarisations.len();

        let mut jobs: Vec<(PathBuf, Vec<&Mem>, usize, &str)> = vec![];
        for (p, pol) in self.settings.polarisations.iter().enumerate() {
            if !output.images.is_empty() {
                jobs.push((
                    PathBuf::from(format!("{}_{pol}.fits", root.display())),
                    output.images.iter().skip(p).step_by(num_pols).collect(),
                    self.settings.image_size,
                    "JY/BEAM",
                ));
            }
            if !output.grids.is_empty() {
                jobs.push((
                    PathBuf::from(format!("{}_{pol}_GRID.fits", root.display())),
                    output.grids.iter().skip(p).step_by(num_pols).collect(),
                    self.plane_size,
                    "JY",
                ));
            }
        }

        let mut written = vec![];
        for (path, planes, size, bunit) in jobs {
            log.info(format!("Writing {}", path.display()));
            let history = log.history_records();
            // Grid cells have the same angular scale as the padded image.
            fits::write_cube(
                &path,
                &planes,
                &fits::CubeHeader {
                    size,
                    cellsize_deg: self.cellsize_rad.to_degrees(),
                    phase_centre: self.phase_centre,
                    freq_start_hz,
                    freq_inc_hz,
                    obs_start: self.obs_start,
                    bunit,
                    history: &history,
                },
            )?;
            written.push(path);
        }
        output.files = written;
        Ok(())
    }

    /// The frequency of channel 0 and the channel separation \[Hz\] of
    /// output cubes. Unless the settings give them, they come from the
    /// updated channels, accounting for any channels that were skipped.
    fn freq_axis(&self) -> (f64, f64) {
        let mut updated = self
            .channel_freqs
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|f| (i, f)));
        let first = updated.next();
        let second = updated.next();
        let derived_inc = match (first, second) {
            (Some((i0, f0)), Some((i1, f1))) => (f1 - f0) / (i1 - i0) as f64,
            _ => 1.0,
        };
        let freq_inc_hz = self.settings.freq_inc_hz.unwrap_or(derived_inc);
        let freq_start_hz = match (self.settings.freq_start_hz, first) {
            (Some(f), _) => f,
            (None, Some((i0, f0))) => f0 - i0 as f64 * freq_inc_hz,
            (None, None) => 0.0,
        };
        (freq_start_hz, freq_inc_hz)
    }

    /// Release all planes and cached state, ready for a new imaging run.
    pub fn reset(&mut self) {
        self.state = ImagerState::Empty;
        self.planes.clear();
        self.plane_norms.clear();
        self.channel_freqs.clear();
        self.num_input_files = 0;
        self.gridder = None;
        self.dft_pixels = None;
        self.fft = None;
        self.correction = None;
        self.output = None;
    }
}

/// Form the requested polarisation products of every visibility.
fn pol_products(vis: &Mem, pols: &[Polarisation]) -> Result<Vec<Vec<c64>>, ImagerError> {
    let vis = match vis.location() {
        Location::Cpu => vis.convert_precision(Precision::Double)?,
        Location::Gpu => vis
            .copy_to_location(Location::Cpu)?
            .convert_precision(Precision::Double)?,
    };
    if vis.is_matrix() {
        let vis = vis.jones::<f64>()?;
        Ok(pols
            .iter()
            .map(|pol| vis.iter().map(|j| pol.from_jones(j)).collect())
            .collect())
    } else if vis.is_complex() {
        let vis = vis.complex::<f64>()?;
        pols.iter()
            .map(|&pol| {
                vis.iter()
                    .map(|&v| pol.from_scalar(v).ok_or(ImagerError::PolarisationUnavailable(pol)))
                    .collect()
            })
            .collect()
    } else {
        Err(KernelError::TypeMismatch {
            name: "vis",
            expected: "complex or matrix".to_string(),
            actual: vis.mem_type(),
        }
        .into())
    }
}

/// Grid every visibility of a block and its Hermitian conjugate, returning
/// the total weight gridded.
fn grid_block<F: Real>(
    (gridder, size, scale, wavelength): (&Gridder, usize, f64, f64),
    plane: &mut Mem,
    uvws: &[UVW],
    values: &[c64],
    weights: &[f64],
) -> Result<f64, KernelError> {
    let grid = plane.complex_mut::<F>()?;
    let mut norm = 0.0;
    for ((uvw, &vis), &weight) in uvws.iter().zip(values).zip(weights) {
        let uvw = UVW {
            u: uvw.u / wavelength,
            v: uvw.v / wavelength,
            w: uvw.w / wavelength,
        };
        norm += gridder.grid(grid, size, scale, uvw, vis, weight);
        norm += gridder.grid(
            grid,
            size,
            scale,
            UVW {
                u: -uvw.u,
                v: -uvw.v,
                w: -uvw.w,
            },
            vis.conj(),
            weight,
        );
    }
    Ok(norm)
}

fn transform_and_correct<F: Real>(
    plane: &mut Mem,
    fft: &Fft2d,
    correction: &Mem,
    size: usize,
) -> Result<(), KernelError> {
    fftphase(plane.complex_mut::<F>()?, size);
    fft.process(plane)?;
    let data = plane.complex_mut::<F>()?;
    fftphase(data, size);

    let correction = correction.real::<F>()?;
    for (row, c_y) in data.chunks_exact_mut(size).zip(correction) {
        for (cell, c_x) in row.iter_mut().zip(correction) {
            let c = *c_x * *c_y;
            *cell = if c == F::zero() {
                Default::default()
            } else {
                *cell / c
            };
        }
    }
    Ok(())
}

/// Keep the real part of a plane, and crop it to the centred
/// `image_size * image_size` region.
pub fn trim_image(plane: &mut Mem, plane_size: usize, image_size: usize) -> Result<(), KernelError> {
    plane.take_real_part()?;
    if plane_size == image_size {
        return Ok(());
    }
    if image_size > plane_size {
        return Err(KernelError::InvalidArgument(format!(
            "Can't trim a plane of size {plane_size} to a larger size {image_size}"
        )));
    }
    plane.meta().check_len("plane", plane_size * plane_size)?;

    let start = ((plane_size - image_size) / 2) * (plane_size + 1);
    match plane.precision() {
        Precision::Single => crop(plane.real_mut::<f32>()?, start, plane_size, image_size),
        Precision::Double => crop(plane.real_mut::<f64>()?, start, plane_size, image_size),
    }
    plane.realloc(image_size * image_size)
}

fn crop<T: Copy>(data: &mut [T], start: usize, plane_size: usize, image_size: usize) {
    for row in 0..image_size {
        let src = start + row * plane_size;
        data.copy_within(src..src + image_size, row * image_size);
    }
}
