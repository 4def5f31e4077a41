// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolutional gridding of visibilities.

use log::debug;
use marlu::{c64, UVW};
use num_complex::Complex;
use rayon::prelude::*;

use super::{GridKernelType, ImagerSettings, ImagingAlgorithm};
use crate::{
    constants::{SPHEROIDAL_SUPPORT, TAU, W_KERNEL_IMAGE_SAMPLES},
    math::{
        cexp,
        spheroidal::{
            grdsf, oversampled_correction, pillbox_correction, spheroidal_correction,
            spheroidal_kernel,
        },
    },
    mem::Real,
};

/// How visibilities are put onto a grid.
pub(super) enum Gridder {
    /// Each visibility goes into its nearest cell.
    Pillbox,

    /// Each visibility is spread over a 7x7 box of cells with a
    /// prolate-spheroidal kernel.
    Spheroidal,

    WProjection(WKernels),
}

impl Gridder {
    /// `w_max` is only used for W-projection, and only if the settings don't
    /// specify one \[wavelengths\].
    pub(super) fn new(
        settings: &ImagerSettings,
        plane_size: usize,
        cellsize_rad: f64,
        w_max: f64,
    ) -> Gridder {
        match (settings.algorithm, settings.kernel) {
            (ImagingAlgorithm::WProjection, _) => {
                let w_max = settings
                    .w_max
                    .unwrap_or(w_max)
                    .max(f64::MIN_POSITIVE);
                Gridder::WProjection(WKernels::new(
                    settings.num_w_planes,
                    w_max,
                    settings.support,
                    settings.oversample,
                    plane_size,
                    cellsize_rad,
                ))
            }
            (_, GridKernelType::Pillbox) => Gridder::Pillbox,
            (_, GridKernelType::Spheroidal) => Gridder::Spheroidal,
        }
    }

    /// The grid-correction function along one axis of a plane.
    pub(super) fn correction(&self, plane_size: usize) -> Vec<f64> {
        match self {
            Gridder::Pillbox => pillbox_correction(plane_size),
            Gridder::Spheroidal => spheroidal_correction(plane_size),
            Gridder::WProjection(k) => {
                oversampled_correction(&k.central_row(), k.oversample, plane_size)
            }
        }
    }

    /// Add a weighted visibility to a grid of side `size`. `uvw` is in
    /// wavelengths, and `scale` converts wavelengths to grid cells. The
    /// weight that was gridded is returned; visibilities whose kernel falls
    /// off the grid are skipped and contribute nothing.
    pub(super) fn grid<F: Real>(
        &self,
        grid: &mut [Complex<F>],
        size: usize,
        scale: f64,
        uvw: UVW,
        vis: c64,
        weight: f64,
    ) -> f64 {
        let half = (size / 2) as f64;
        let gx = uvw.u * scale + half;
        let gy = uvw.v * scale + half;
        let (ix, iy) = (gx.round(), gy.round());
        let support = match self {
            Gridder::Pillbox => 0,
            Gridder::Spheroidal => SPHEROIDAL_SUPPORT,
            Gridder::WProjection(k) => k.support,
        } as f64;
        if ix - support < 0.0
            || iy - support < 0.0
            || ix + support >= size as f64
            || iy + support >= size as f64
        {
            return 0.0;
        }
        let (ix, iy) = (ix as usize, iy as usize);
        let (fx, fy) = (gx - ix as f64, gy - iy as f64);
        let value = vis * weight;

        match self {
            Gridder::Pillbox => {
                add(&mut grid[iy * size + ix], value);
            }

            Gridder::Spheroidal => {
                let s = SPHEROIDAL_SUPPORT as isize;
                let width = SPHEROIDAL_SUPPORT as f64;
                let kx: Vec<f64> = (-s..=s)
                    .map(|c| spheroidal_kernel((c as f64 - fx) / width))
                    .collect();
                let ky: Vec<f64> = (-s..=s)
                    .map(|c| spheroidal_kernel((c as f64 - fy) / width))
                    .collect();
                let sum = kx.iter().sum::<f64>() * ky.iter().sum::<f64>();
                if sum == 0.0 {
                    return 0.0;
                }
                for (j, ky) in ky.iter().enumerate() {
                    let row = (iy + j - SPHEROIDAL_SUPPORT) * size;
                    for (i, kx) in kx.iter().enumerate() {
                        add(
                            &mut grid[row + ix + i - SPHEROIDAL_SUPPORT],
                            value * (kx * ky / sum),
                        );
                    }
                }
            }

            Gridder::WProjection(k) => {
                let plane = k.plane_index(uvw.w.abs());
                let kernel = &k.kernels[plane];
                let kernel_0 = &k.kernels[0];
                let conv_size = k.conv_size();
                let s = k.support as isize;
                let oversample = k.oversample as f64;
                let centre = (k.support * k.oversample) as f64;
                let index = |c: isize, f: f64| {
                    let i = ((c as f64 - f) * oversample).round() + centre;
                    if i >= 0.0 && i < conv_size as f64 {
                        Some(i as usize)
                    } else {
                        None
                    }
                };

                let mut cells = Vec::with_capacity(conv_size * conv_size);
                let mut sum = 0.0;
                for (cy, ky) in (-s..=s).filter_map(|cy| index(cy, fy).map(|ky| (cy, ky))) {
                    for (cx, kx) in (-s..=s).filter_map(|cx| index(cx, fx).map(|kx| (cx, kx))) {
                        let k_index = ky * conv_size + kx;
                        sum += kernel_0[k_index].re;
                        let cell = (iy as isize + cy) as usize * size + (ix as isize + cx) as usize;
                        cells.push((cell, k_index));
                    }
                }
                if sum == 0.0 {
                    return 0.0;
                }
                for (cell, k_index) in cells {
                    let c = if uvw.w < 0.0 {
                        kernel[k_index].conj()
                    } else {
                        kernel[k_index]
                    };
                    add(&mut grid[cell], value * c / sum);
                }
            }
        }
        weight
    }
}

#[inline]
fn add<F: Real>(cell: &mut Complex<F>, value: c64) {
    cell.re += F::from_f64(value.re);
    cell.im += F::from_f64(value.im);
}

/// Oversampled W-projection kernels, one per w plane.
pub(super) struct WKernels {
    /// Half-width \[grid cells\].
    pub(super) support: usize,
    pub(super) oversample: usize,
    /// \[wavelengths\]
    pub(super) w_max: f64,
    /// Each kernel is `conv_size * conv_size`, row-major in v. Kernel `p` is
    /// for `w = w_max (p / (num_planes - 1))^2`.
    pub(super) kernels: Vec<Vec<c64>>,
}

impl WKernels {
    pub(super) fn new(
        num_planes: usize,
        w_max: f64,
        support: usize,
        oversample: usize,
        plane_size: usize,
        cellsize_rad: f64,
    ) -> WKernels {
        debug!(
            "Generating {num_planes} W-projection kernels (w_max {w_max:.3} wavelengths, support {support}, oversample {oversample})"
        );
        let plane_fov = plane_size as f64 * cellsize_rad;
        let kernels = (0..num_planes)
            .into_par_iter()
            .map(|p| {
                w_kernel(
                    plane_w(p, num_planes, w_max),
                    support,
                    oversample,
                    plane_fov,
                )
            })
            .collect();
        WKernels {
            support,
            oversample,
            w_max,
            kernels,
        }
    }

    pub(super) fn conv_size(&self) -> usize {
        2 * self.support * self.oversample + 1
    }

    /// Planes are spaced by the square root of |w|. Any |w| beyond `w_max`
    /// uses the last plane.
    pub(super) fn plane_index(&self, w_abs: f64) -> usize {
        let num_planes = self.kernels.len();
        if num_planes <= 1 {
            return 0;
        }
        let p = ((w_abs / self.w_max).sqrt() * (num_planes - 1) as f64).round();
        (p as usize).min(num_planes - 1)
    }

    /// The real part of the central row of the w = 0 kernel.
    fn central_row(&self) -> Vec<f64> {
        let conv_size = self.conv_size();
        let row = conv_size / 2;
        self.kernels[0][row * conv_size..(row + 1) * conv_size]
            .iter()
            .map(|c| c.re)
            .collect()
    }
}

fn plane_w(p: usize, num_planes: usize, w_max: f64) -> f64 {
    if num_planes <= 1 {
        return 0.0;
    }
    let frac = p as f64 / (num_planes - 1) as f64;
    w_max * frac * frac
}

/// The uv-plane kernel for a single w: the Fourier transform of a tapered
/// w-screen `exp(-2 pi i w (n - 1))`, sampled across the image plane. The
/// transform is done directly, separating the u and v sums.
fn w_kernel(w: f64, support: usize, oversample: usize, plane_fov: f64) -> Vec<c64> {
    let num_samples = W_KERNEL_IMAGE_SAMPLES;
    let conv_size = 2 * support * oversample + 1;
    let centre = (support * oversample) as f64;

    // Image-plane samples, as fractions of the plane's field of view.
    let s: Vec<f64> = (0..num_samples)
        .map(|i| (i as f64 - (num_samples / 2) as f64) / num_samples as f64)
        .collect();
    let taper: Vec<f64> = s.iter().map(|s| grdsf(2.0 * s)).collect();
    // exp(2 pi i d s), for each kernel offset d (in cells) and sample s.
    let phasors: Vec<Vec<c64>> = (0..conv_size)
        .map(|k| {
            let d = (k as f64 - centre) / oversample as f64;
            s.iter().map(|s| cexp(TAU * d * s)).collect()
        })
        .collect();

    // Transform along l for every m sample.
    let partial: Vec<Vec<c64>> = s
        .par_iter()
        .map(|s_m| {
            let m = s_m * plane_fov;
            let screen: Vec<c64> = s
                .iter()
                .zip(taper.iter())
                .map(|(s_l, t)| {
                    let l = s_l * plane_fov;
                    let r2 = l * l + m * m;
                    if r2 >= 1.0 {
                        c64::default()
                    } else {
                        cexp(-TAU * w * ((1.0 - r2).sqrt() - 1.0)) * *t
                    }
                })
                .collect();
            phasors
                .iter()
                .map(|p| screen.iter().zip(p).map(|(a, b)| a * b).sum())
                .collect()
        })
        .collect();

    // Then along m.
    let mut kernel = vec![c64::default(); conv_size * conv_size];
    kernel
        .par_chunks_exact_mut(conv_size)
        .zip(phasors.par_iter())
        .for_each(|(row, p_v)| {
            for (j, (part, t)) in partial.iter().zip(taper.iter()).enumerate() {
                let factor = p_v[j] * *t;
                row.iter_mut()
                    .zip(part.iter())
                    .for_each(|(k, a)| *k += a * factor);
            }
        });
    kernel
}
